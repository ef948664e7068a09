use async_trait::async_trait;
use sayso_extraction::ProposedAction;
use sayso_memory::{ActionRecord, UiContextMirror, UiWindow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Orchestrator channel closed")]
    ChannelClosed,
}

/// Result of one tool execution. Failure is data, not a control-flow
/// error: the orchestrator keeps running and the action stays eligible
/// for re-proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Maps an accepted action to a concrete side effect. Receives the current
/// UI context so relative selectors resolve against present state. Does no
/// de-duplication of its own; at-most-once is the orchestrator's job.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, action: &ProposedAction, ui: &UiContextMirror) -> ExecutionResult;
}

/// Inbound events from the host environment.
#[derive(Debug, Clone)]
pub enum Event {
    /// The entire current transcript, pushed on each detected pause.
    Transcript(String),
    /// Whole-snapshot replacement of externally-owned window state.
    UiSnapshot(Vec<UiWindow>),
    /// Session teardown.
    Shutdown,
}

/// Observable outcomes. Every failure and every filter decision surfaces
/// here or in the log; nothing is silently swallowed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// Extraction failed (unavailable, timeout, or malformed reply); the
    /// engine returned to idle without a fallback parser. One per failed
    /// cycle.
    AssistantUnavailable { message: String },
    /// A verified action executed successfully and was committed.
    ActionExecuted { record: ActionRecord },
    /// A verified action failed to execute; not recorded, eligible for
    /// re-proposal.
    ActionFailed { tool: String, error: String },
    /// A proposal was dropped by verification. Normal filter outcome, not
    /// an error.
    ActionRejected { tool: String, reason: String },
}
