use async_trait::async_trait;
use sayso_memory::ConversationState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction service unavailable: {0}")]
    Unavailable(String),
    #[error("Extraction timed out")]
    Timeout,
    #[error("Malformed extraction response: {0}")]
    Malformed(String),
}

/// A candidate action emitted by the extraction service. Untrusted until
/// the orchestrator corroborates `source_text` against the literal
/// transcript and checks the ledger for duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    pub tool: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub source_text: String,
}

/// Contract with the external reasoning service.
///
/// Given the full transcript, recent action history, and UI context, the
/// service should return only actions whose justifying phrase is not
/// already represented in the history, and nothing for syntactically
/// incomplete commands. The orchestrator does not trust this diffing; it
/// re-validates every proposal.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(
        &self,
        state: &ConversationState,
    ) -> Result<Vec<ProposedAction>, ExtractionError>;
}
