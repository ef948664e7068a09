mod config;

use anyhow::{Context, Result};
use async_trait::async_trait;
use config::Config;
use sayso_core::{Notification, Orchestrator, OrchestratorConfig};
use sayso_executor::RegistryExecutor;
use sayso_extraction::OpenAiCompatibleExtractor;
use sayso_memory::{SessionStore, UiWindow};
use sayso_tools::{
    CloseWindowTool, OpenWindowTool, SearchClient, SearchTool, ToolError, ToolRegistry, UiCommand,
    UiCommandSink,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// One JSON line from the host environment: either the speech layer
/// pushing the entire current transcript, or the UI layer pushing a
/// whole-window snapshot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundEvent {
    Transcript { transcript: String },
    Windows { windows: Vec<UiWindow> },
}

/// UI commands leave the core as JSON lines on stdout; the UI layer
/// renders them without further core involvement.
struct StdoutSink;

#[async_trait]
impl UiCommandSink for StdoutSink {
    async fn send(&self, command: UiCommand) -> Result<(), ToolError> {
        let line = serde_json::to_string(&command)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        println!("{}", line);
        Ok(())
    }
}

fn build_registry(config: &Config, sink: Arc<dyn UiCommandSink>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(OpenWindowTool::new(sink.clone())));
    registry.register(Arc::new(CloseWindowTool::new(sink.clone())));
    registry.register(Arc::new(SearchTool::new(
        SearchClient::new(
            config.search_endpoint.clone(),
            Duration::from_millis(config.search_timeout_ms),
        ),
        sink,
    )));
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the UI command stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load("config.toml")?;

    let store = SessionStore::new(&config.sessions_dir);
    store
        .initialize()
        .await
        .context("Failed to initialize session store")?;
    let session = store
        .load(&config.session_id)
        .await
        .context("Failed to load session")?;

    let sink: Arc<dyn UiCommandSink> = Arc::new(StdoutSink);
    let registry = build_registry(&config, sink);
    info!(tools = ?registry.list(), "tool registry ready");

    let extractor = Arc::new(
        OpenAiCompatibleExtractor::new(
            config.extractor.base_url.clone(),
            config.api_key(),
            config.extractor.model.clone(),
            Duration::from_millis(config.extractor.timeout_ms),
        )
        .with_tool_catalog(registry.catalog()),
    );

    let executor = Arc::new(RegistryExecutor::new(registry));

    let orchestrator_config = OrchestratorConfig {
        session_id: config.session_id.clone(),
        transcript_cap: config.transcript_cap,
        ledger_cap: config.ledger_cap,
        backoff_base: Duration::from_millis(config.backoff.base_ms),
        backoff_max: Duration::from_millis(config.backoff.max_ms),
    };

    let (orchestrator, handle, mut notifications) =
        Orchestrator::new(orchestrator_config, extractor, executor);
    let orchestrator = orchestrator
        .with_session_store(store)
        .with_restored_session(session);
    let runner = tokio::spawn(orchestrator.run());

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match serde_json::to_string(&notification) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "failed to serialize notification"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundEvent>(line) {
            Ok(InboundEvent::Transcript { transcript }) => {
                handle.push_transcript(transcript).await?;
            }
            Ok(InboundEvent::Windows { windows }) => {
                handle.push_ui_snapshot(windows).await?;
            }
            Err(e) => {
                warn!(error = %e, "ignoring unparseable input line");
            }
        }
    }

    info!("input closed; shutting down");
    handle.shutdown().await?;
    runner.await.context("Orchestrator task panicked")?;
    Ok(())
}
