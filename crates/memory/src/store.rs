//! Session persistence for conversational memory.

use crate::ledger::ActionRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk shape of one session: the transcript tail plus the action
/// history needed to keep de-duplication working across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub transcript: String,
    pub actions: Vec<ActionRecord>,
}

pub struct SessionStore {
    base_path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn initialize(&self) -> Result<(), MemoryError> {
        fs::create_dir_all(&self.base_path).await?;
        tracing::info!("Session store initialized at {:?}", self.base_path);
        Ok(())
    }

    pub async fn load(&self, session_id: &str) -> Result<SessionSnapshot, MemoryError> {
        let path = self.session_path(session_id);

        if !path.exists() {
            tracing::info!("Creating new session: {}", session_id);
            return Ok(SessionSnapshot {
                session_id: session_id.to_string(),
                ..Default::default()
            });
        }

        let content = fs::read_to_string(&path).await?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;

        tracing::info!("Loaded session: {}", session_id);
        Ok(snapshot)
    }

    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), MemoryError> {
        let path = self.session_path(&snapshot.session_id);

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(snapshot)?;

        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Saved session: {}", snapshot.session_id);
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), MemoryError> {
        let path = self.session_path(session_id);
        if path.exists() {
            fs::remove_file(&path).await?;
            tracing::info!("Deleted session: {}", session_id);
        }
        Ok(())
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, MemoryError> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    sessions.push(name.trim_end_matches(".json").to_string());
                }
            }
        }

        Ok(sessions)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", session_id))
    }
}
