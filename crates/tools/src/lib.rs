pub mod registry;
pub mod search;
pub mod traits;
pub mod ui;
pub mod window_tools;

pub use registry::ToolRegistry;
pub use search::{SearchClient, SearchTool};
pub use traits::{Tool, ToolError, ToolResult};
pub use ui::{UiCommand, UiCommandSink};
pub use window_tools::{CloseWindowTool, OpenWindowTool};
