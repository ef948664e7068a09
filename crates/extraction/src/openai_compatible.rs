//! Intent extraction over an OpenAI-compatible chat completions endpoint.

use crate::traits::{ExtractionError, IntentExtractor, ProposedAction};
use async_trait::async_trait;
use reqwest::Client;
use sayso_memory::ConversationState;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are the command extraction service for a voice-driven \
desktop assistant. You receive the user's full speech transcript, the history of actions \
already executed, the current window state, and the catalog of available tools. Reply \
with JSON of the form \
{\"new_tool_calls\": [{\"tool\": ..., \"parameters\": {...}, \"source_text\": ...}]}. \
Return only actions whose justifying phrase is not already represented in the action \
history. source_text must be the exact transcript phrase that justifies the action. \
Return an empty list for commands that are syntactically incomplete. Reply with JSON only.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    new_tool_calls: Vec<ProposedAction>,
}

pub struct OpenAiCompatibleExtractor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    tool_catalog: Vec<serde_json::Value>,
}

impl OpenAiCompatibleExtractor {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
            timeout,
            tool_catalog: Vec::new(),
        }
    }

    /// Advertise the available tools (name, description, parameter schema)
    /// in every extraction request.
    pub fn with_tool_catalog(mut self, catalog: Vec<serde_json::Value>) -> Self {
        self.tool_catalog = catalog;
        self
    }

    fn request_body(&self, state: &ConversationState) -> serde_json::Value {
        let payload = json!({
            "full_transcript": state.transcript,
            "action_history": state.recent_actions,
            "ui_context": state.ui,
            "available_tools": self.tool_catalog,
        });

        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": payload.to_string() },
            ],
        })
    }
}

#[async_trait]
impl IntentExtractor for OpenAiCompatibleExtractor {
    async fn extract(
        &self,
        state: &ConversationState,
    ) -> Result<Vec<ProposedAction>, ExtractionError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(&self.request_body(state));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ExtractionError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout
                } else {
                    ExtractionError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Unavailable(format!("{}: {}", status, text)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let proposals = parse_extraction_response(&body)?;
        tracing::debug!(proposed = proposals.len(), "extraction service replied");
        Ok(proposals)
    }
}

/// Parse an OpenAI-compatible chat response whose message content is the
/// `{"new_tool_calls": [...]}` contract JSON.
pub fn parse_extraction_response(
    body: &serde_json::Value,
) -> Result<Vec<ProposedAction>, ExtractionError> {
    let response: ChatResponse = serde_json::from_value(body.clone())
        .map_err(|e| ExtractionError::Malformed(format!("response schema: {}", e)))?;

    let content = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .ok_or_else(|| ExtractionError::Malformed("no message content".to_string()))?;

    // Tolerate code-fenced replies; the contract is JSON-only but providers
    // wrap anyway.
    let stripped = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let reply: ExtractionReply = serde_json::from_str(stripped)
        .map_err(|e| ExtractionError::Malformed(format!("content schema: {}", e)))?;

    for call in &reply.new_tool_calls {
        if call.tool.is_empty() || call.source_text.is_empty() {
            return Err(ExtractionError::Malformed(
                "tool call missing tool name or source_text".to_string(),
            ));
        }
    }

    Ok(reply.new_tool_calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [
                { "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    #[test]
    fn test_parse_tool_calls() {
        let body = chat_body(
            r#"{"new_tool_calls": [{"tool": "open_window", "parameters": {"content": "cheese"}, "source_text": "open a window saying cheese"}]}"#,
        );
        let calls = parse_extraction_response(&body).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "open_window");
        assert_eq!(calls[0].parameters["content"], "cheese");
    }

    #[test]
    fn test_parse_empty_list() {
        let body = chat_body(r#"{"new_tool_calls": []}"#);
        assert!(parse_extraction_response(&body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_code_fenced_reply() {
        let body = chat_body(
            "```json\n{\"new_tool_calls\": [{\"tool\": \"search\", \"parameters\": {\"query\": \"weather\"}, \"source_text\": \"search the weather\"}]}\n```",
        );
        let calls = parse_extraction_response(&body).unwrap();
        assert_eq!(calls[0].tool, "search");
    }

    #[test]
    fn test_non_json_content_is_malformed() {
        let body = chat_body("sure, I opened a window for you!");
        assert!(matches!(
            parse_extraction_response(&body),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_source_text_is_malformed() {
        let body = chat_body(r#"{"new_tool_calls": [{"tool": "open_window", "source_text": ""}]}"#);
        assert!(matches!(
            parse_extraction_response(&body),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_choices_is_malformed() {
        let body = json!({"choices": []});
        assert!(matches!(
            parse_extraction_response(&body),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_body_carries_state() {
        let extractor = OpenAiCompatibleExtractor::new(
            "http://localhost:8000/v1".to_string(),
            None,
            "test-model".to_string(),
            Duration::from_secs(5),
        )
        .with_tool_catalog(vec![json!({"name": "open_window"})]);
        let state = ConversationState {
            transcript: "open a window".to_string(),
            recent_actions: vec![],
            ui: Default::default(),
        };
        let body = extractor.request_body(&state);
        assert_eq!(body["model"], "test-model");
        let user_content = body["messages"][1]["content"].as_str().unwrap();
        assert!(user_content.contains("open a window"));
        assert!(user_content.contains("action_history"));
        assert!(user_content.contains("open_window"));
    }
}
