pub mod backoff;
pub mod orchestrator;
pub mod types;

pub use backoff::Backoff;
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorHandle};
pub use types::*;
