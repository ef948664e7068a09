pub mod openai_compatible;
pub mod traits;

pub use openai_compatible::OpenAiCompatibleExtractor;
pub use traits::{ExtractionError, IntentExtractor, ProposedAction};
