//! Syncstage Server - standalone headless server for the room coordination
//! engine.
//!
//! Binds an HTTP/WebSocket listener, bootstraps the client/playback
//! registries, and serves rooms until a shutdown signal arrives.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use syncstage_core::{bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// Syncstage Server - headless synchronized media-playback room server.
#[derive(Parser, Debug)]
#[command(name = "syncstage-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SYNCSTAGE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file; 0 = auto-allocate).
    #[arg(short = 'p', long, env = "SYNCSTAGE_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Syncstage Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    log::info!(
        "Configuration: bind_port={}, room_reap_grace_period_secs={}, reap_interval_secs={}",
        config.bind_port,
        config.room_reap_grace_period_secs,
        config.reap_interval_secs
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(core_config);
    log::info!("Services bootstrapped successfully");

    let app_state = AppState::builder()
        .from_services(&services)
        .config(Arc::new(parking_lot::RwLock::new(services.config.clone())))
        .build();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

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
