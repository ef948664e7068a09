use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub session_id: String,
    pub sessions_dir: PathBuf,
    pub transcript_cap: usize,
    pub ledger_cap: usize,
    pub extractor: ExtractorConfig,
    pub backoff: BackoffConfig,
    pub search_endpoint: String,
    pub search_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key; unset means no auth.
    pub api_key_env: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_id: "voice_main".to_string(),
            sessions_dir: PathBuf::from("./data/sessions"),
            transcript_cap: 2000,
            ledger_cap: 10,
            extractor: ExtractorConfig {
                base_url: "http://localhost:8000/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key_env: "SAYSO_API_KEY".to_string(),
                timeout_ms: 15_000,
            },
            backoff: BackoffConfig {
                base_ms: 500,
                max_ms: 30_000,
            },
            search_endpoint: "http://localhost:8001/search".to_string(),
            search_timeout_ms: 10_000,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}; using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.extractor.api_key_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config.transcript_cap, 2000);
        assert_eq!(config.ledger_cap, 10);
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.transcript_cap = 500;
        config.extractor.model = "local-model".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.transcript_cap, 500);
        assert_eq!(loaded.extractor.model, "local-model");
    }
}
