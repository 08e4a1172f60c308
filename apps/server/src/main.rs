//! Transcribe Server - standalone server for the real-time speech-to-text gateway.
//!
//! Bridges downstream WebSocket clients streaming raw PCM audio to the upstream
//! Volcengine ASR service, with an optional LLM rewrite pass, and runs as a
//! background daemon with no GUI.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use transcribe_core::{bootstrap_services, start_server, AppState};

use crate::config::ServerConfig;

/// Transcribe Server - headless speech-to-text streaming gateway.
#[derive(Parser, Debug)]
#[command(name = "transcribe-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "TRANSCRIBE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "TRANSCRIBE_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Transcribe Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    if !config.volcengine.asr_valid() {
        log::warn!(
            "Volcengine ASR credentials are incomplete - sessions will fail at the upstream \
             connect step until app_key/access_key/resource_id are configured"
        );
    }
    if !config.volcengine.ark_valid() {
        log::info!("Ark correction credentials are not configured - LLM rewrite is unavailable");
    }

    let core_config = config.to_core_config();
    let services = bootstrap_services(core_config.clone());

    log::info!("Services bootstrapped successfully");

    let app_state = AppState::builder()
        .from_services(&services)
        .config(Arc::new(RwLock::new(core_config)))
        .build();

    // Spawn the HTTP/WebSocket server on the main tokio runtime.
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server task started");

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown: cancels every in-flight session and force-closes
    // any downstream connection still registered.
    services.shutdown().await;

    // Abort the server task (it will have stopped accepting work once services shut down)
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
