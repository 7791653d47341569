//! DMXX Server - Standalone headless lighting control server.
//!
//! This binary wires the core engine, input receivers, and HTTP/WebSocket API together
//! and runs them to completion. It's designed for fixed-installation deployments where
//! the lighting console runs as a background daemon alongside a browser-based operator
//! UI served by the external HTTP collaborator.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dmxx_core::{bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// DMXX Server - Headless networked DMX512 lighting control server.
#[derive(Parser, Debug)]
#[command(name = "dmxx-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "DMXX_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind host (overrides config file).
    #[arg(long, env = "DMXX_HOST")]
    host: Option<String>,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "DMXX_PORT")]
    port: Option<u16>,

    /// Directory holding the persisted configuration snapshot.
    #[arg(short = 'd', long, env = "DMXX_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("DMXX Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    log::info!(
        "Configuration: host={}, port={}",
        config.host,
        if config.port == 0 { "auto".to_string() } else { config.port.to_string() }
    );

    let initial_snapshot = config
        .load_snapshot()
        .context("Failed to load the persisted configuration snapshot")?;
    log::info!(
        "Loaded {} universe(s), {} scene(s), {} profile(s)",
        initial_snapshot.universes.len(),
        initial_snapshot.scenes.len(),
        initial_snapshot.profiles.len()
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(core_config, initial_snapshot);
    log::info!("Services bootstrapped successfully");

    let app_state = AppState::builder().from_services(&services).build();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP/WebSocket server started");

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
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
