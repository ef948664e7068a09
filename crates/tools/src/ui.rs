//! Commands the core emits to the external UI layer.

use crate::traits::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A render command carrying enough data for the UI layer to act without
/// further core involvement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UiCommand {
    OpenWindow {
        id: String,
        title: String,
        content: String,
    },
    CloseWindow {
        id: String,
    },
    DisplaySearchResults {
        query: String,
        results: Vec<serde_json::Value>,
    },
}

/// Outbound boundary to the UI layer. The app wires a JSON-lines stdout
/// sink; tests wire capturing mocks.
#[async_trait]
pub trait UiCommandSink: Send + Sync {
    async fn send(&self, command: UiCommand) -> Result<(), ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd = UiCommand::OpenWindow {
            id: "win-1".to_string(),
            title: "Note".to_string(),
            content: "cheese".to_string(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "open_window");
        assert_eq!(json["content"], "cheese");

        let cmd = UiCommand::CloseWindow {
            id: "win-1".to_string(),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "close_window");
    }
}
