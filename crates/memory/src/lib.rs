pub mod ledger;
pub mod store;
pub mod transcript;
pub mod types;

pub use ledger::{ActionLedger, ActionRecord, DedupKey};
pub use store::{MemoryError, SessionSnapshot, SessionStore};
pub use transcript::{TranscriptUpdate, TranscriptWindow};
pub use types::*;
