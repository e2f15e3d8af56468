//! Colloquy daemon binary.
//!
//! Loads configuration, wires the LLM client, tools, and engines into the
//! conversation orchestrator, and serves client requests over a Unix
//! domain socket until SIGTERM/SIGINT.

mod config;
mod error;
mod orchestrator;
mod server;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use colloquy::{ReplyEngine, TitleEngine};
use colloquy_client::OpenAIClient;
use colloquy_tools::{CalculatorTool, CurrentDateTool, ToolExecutor, ToolRegistry, WeatherTool};

use crate::config::DaemonConfig;
use crate::orchestrator::Orchestrator;
use crate::server::Server;
use crate::storage::Storage;

/// Initializes the tracing subscriber.
///
/// Uses JSON format if `COLLOQUY_LOG_FORMAT=json`, otherwise pretty
/// format. The filter defaults to info level for daemon and engine crates
/// and can be overridden with `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("colloquy_daemon=info,colloquy=info"));

    let use_json = std::env::var("COLLOQUY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Builds the tool registry from the configured toggles.
fn build_tool_registry(config: &DaemonConfig) -> Result<ToolRegistry> {
    let registry = ToolRegistry::new();

    if config.tools.calculator {
        registry.register(Arc::new(CalculatorTool));
    }
    if config.tools.current_date {
        registry.register(Arc::new(CurrentDateTool));
    }
    if config.tools.weather {
        registry.register(Arc::new(
            WeatherTool::new().context("failed to build weather tool")?,
        ));
    }

    info!(tool_count = registry.len(), "registered built-in tools");
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = DaemonConfig::load().map_err(|e| {
        if let Ok(path) = DaemonConfig::config_path() {
            error!(config_path = %path.display(), "failed to load configuration");
        }
        e
    })?;

    let storage = Arc::new(Storage::new()?);

    let client = Arc::new(OpenAIClient::new(config.client_config()?)?);
    info!(
        provider = %config.provider.name,
        model = %config.provider.model,
        "LLM client ready"
    );

    let registry = build_tool_registry(&config)?;
    let executor = ToolExecutor::new(registry);

    let mut reply_engine = ReplyEngine::new(Arc::clone(&client), executor)
        .with_max_iterations(config.engine.max_tool_call_iterations);
    if let Some(model) = &config.engine.reply_model {
        reply_engine = reply_engine.with_model(model.clone());
    }
    if let Some(prompt) = &config.engine.reply_system_prompt {
        reply_engine = reply_engine.with_system_prompt(prompt.clone());
    }

    let mut title_engine = TitleEngine::new(client);
    if let Some(model) = &config.engine.title_model {
        title_engine = title_engine.with_model(model.clone());
    }
    if let Some(prompt) = &config.engine.title_prompt {
        title_engine = title_engine.with_prompt(prompt.clone());
    }

    let orchestrator = Arc::new(Orchestrator::new(
        reply_engine,
        title_engine,
        Arc::clone(&storage),
        Duration::from_secs(config.engine.reply_timeout_seconds),
        Duration::from_secs(config.engine.title_timeout_seconds),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);

    let mut signals = Signals::new([SIGTERM, SIGINT]).context("failed to register signals")?;
    let signal_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Some(signal) = signals.next().await {
            info!(signal, "received shutdown signal");
            let _ = signal_shutdown.send(());
        }
    });

    let server = Arc::new(Server::new(orchestrator, storage, shutdown_tx));
    server.run().await?;

    info!("daemon stopped");
    Ok(())
}
