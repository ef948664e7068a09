//! Web search tool - fetches results and hands them to the UI layer.

use crate::traits::{Tool, ToolError, ToolResult};
use crate::ui::{UiCommand, UiCommandSink};
use async_trait::async_trait;
use sayso_memory::UiContextMirror;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Thin client for a JSON search endpoint. Scraping and proxying live
/// outside the core; this only expects `GET {endpoint}?q={query}` to return
/// a JSON array of result objects.
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SearchClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, endpoint }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<serde_json::Value>, ToolError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolError::Execution(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Execution(format!("search response not JSON: {}", e)))?;

        match body {
            serde_json::Value::Array(items) => Ok(items),
            other => Ok(other
                .get("results")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default()),
        }
    }
}

pub struct SearchTool {
    client: SearchClient,
    sink: Arc<dyn UiCommandSink>,
}

impl SearchTool {
    pub fn new(client: SearchClient, sink: Arc<dyn UiCommandSink>) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Run a web search and display the results"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ui: &UiContextMirror,
    ) -> Result<ToolResult, ToolError> {
        let query = args["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::Validation("Missing 'query' field".to_string()))?;

        let results = self.client.search(query).await?;
        tracing::info!(query, result_count = results.len(), "search completed");

        self.sink
            .send(UiCommand::DisplaySearchResults {
                query: query.to_string(),
                results: results.clone(),
            })
            .await?;

        Ok(ToolResult::ok(json!({ "result_count": results.len() })))
    }
}
