//! Maps accepted actions to concrete tool side effects.

use async_trait::async_trait;
use sayso_core::{ExecutionResult, ToolExecutor};
use sayso_extraction::ProposedAction;
use sayso_memory::UiContextMirror;
use sayso_tools::ToolRegistry;
use tracing::{info, warn};

/// Tool executor backed by the tool registry. De-duplication is not
/// re-derived here; the orchestrator only dispatches actions that passed
/// verification, so each call is at-most-once by construction.
pub struct RegistryExecutor {
    registry: ToolRegistry,
}

impl RegistryExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecutor for RegistryExecutor {
    async fn execute(&self, action: &ProposedAction, ui: &UiContextMirror) -> ExecutionResult {
        let tool = match self.registry.get(&action.tool) {
            Some(tool) => tool,
            None => {
                warn!(tool = %action.tool, "no such tool");
                return ExecutionResult::failed(format!("unknown tool: {}", action.tool));
            }
        };

        info!(tool = %action.tool, "executing action");
        match tool.execute(action.parameters.clone(), ui).await {
            Ok(result) if result.success => ExecutionResult::ok(result.output),
            Ok(result) => ExecutionResult::failed(
                result
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string()),
            ),
            Err(error) => {
                warn!(tool = %action.tool, %error, "tool execution failed");
                ExecutionResult::failed(error.to_string())
            }
        }
    }
}
