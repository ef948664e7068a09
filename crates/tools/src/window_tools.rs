//! Window management tools - open and close windows through the UI layer.

use crate::traits::{Tool, ToolError, ToolResult};
use crate::ui::{UiCommand, UiCommandSink};
use async_trait::async_trait;
use sayso_memory::{UiContextMirror, UiWindow};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn validate_selector(target: &str) -> Result<(), ToolError> {
    if target.trim().is_empty() {
        return Err(ToolError::Validation(
            "window target cannot be empty".to_string(),
        ));
    }
    if target.contains('\n') || target.contains('\0') {
        return Err(ToolError::Validation(
            "window target contains invalid control characters".to_string(),
        ));
    }
    Ok(())
}

/// Resolve a relative or absolute window selector against the current
/// UI context. Supported: "active", "newest", a window id, or a title
/// substring.
fn resolve_window<'a>(ui: &'a UiContextMirror, target: &str) -> Option<&'a UiWindow> {
    match target {
        "active" => ui.active(),
        "newest" => ui.newest(),
        other => ui.by_id(other).or_else(|| ui.by_title(other)),
    }
}

pub struct OpenWindowTool {
    sink: Arc<dyn UiCommandSink>,
    next_id: AtomicU64,
}

impl OpenWindowTool {
    pub fn new(sink: Arc<dyn UiCommandSink>) -> Self {
        Self {
            sink,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Tool for OpenWindowTool {
    fn name(&self) -> &str {
        "open_window"
    }

    fn description(&self) -> &str {
        "Open a new window displaying the given content"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Text content to display in the window"
                },
                "title": {
                    "type": "string",
                    "description": "Optional window title"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ui: &UiContextMirror,
    ) -> Result<ToolResult, ToolError> {
        let content = args["content"]
            .as_str()
            .ok_or_else(|| ToolError::Validation("Missing 'content' field".to_string()))?;
        let title = args["title"].as_str().unwrap_or("Window").to_string();

        // Seed id only; the UI layer owns authoritative window ids and
        // reports them back through the next context snapshot.
        let id = format!("win-{}", self.next_id.fetch_add(1, Ordering::SeqCst));

        self.sink
            .send(UiCommand::OpenWindow {
                id: id.clone(),
                title,
                content: content.to_string(),
            })
            .await?;

        tracing::info!(window_id = %id, "opened window");
        Ok(ToolResult::ok(json!({ "window_id": id })))
    }
}

pub struct CloseWindowTool {
    sink: Arc<dyn UiCommandSink>,
}

impl CloseWindowTool {
    pub fn new(sink: Arc<dyn UiCommandSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for CloseWindowTool {
    fn name(&self) -> &str {
        "close_window"
    }

    fn description(&self) -> &str {
        "Close a window. Target may be 'active', 'newest', a window id, or a title fragment"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "Which window to close: 'active', 'newest', an id, or a title fragment"
                }
            },
            "required": ["target"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ui: &UiContextMirror,
    ) -> Result<ToolResult, ToolError> {
        let target = args["target"]
            .as_str()
            .ok_or_else(|| ToolError::Validation("Missing 'target' field".to_string()))?;
        validate_selector(target)?;

        let window = resolve_window(ui, target)
            .ok_or_else(|| ToolError::NotFound(format!("no window matching '{}'", target)))?;
        let id = window.id.clone();

        self.sink.send(UiCommand::CloseWindow { id: id.clone() }).await?;

        tracing::info!(window_id = %id, target, "closed window");
        Ok(ToolResult::ok(json!({ "window_id": id })))
    }
}
