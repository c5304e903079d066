//! # huddle-server
//!
//! Chat relay server binary. Runs until SIGINT/SIGTERM, then closes every
//! connection and exits 0. A bind failure exits non-zero.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_logging::{LogFormat, LoggingConfig, init_logging};
use huddle_server::{ChatServer, ServerConfig, ShutdownCoordinator};
use tracing::{info, warn};

/// Line-based TCP chat relay.
#[derive(Parser, Debug)]
#[command(name = "huddle-server", about = "Line-based TCP chat relay server")]
struct Cli {
    /// Address to listen on, `host:port` (overrides config and `HUDDLE_ADDR`).
    addr: Option<String>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = init_logging(&LoggingConfig {
        format: cli.log_format,
        ..LoggingConfig::default()
    });

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("Failed to load server config")?;
    if let Some(addr) = cli.addr {
        config.listen_addr = addr;
    }

    let server = ChatServer::bind(config)
        .await
        .context("Failed to start chat server")?;
    info!(
        addr = %server.local_addr()?,
        "ready, press Ctrl+C to shut down"
    );

    let shutdown = ShutdownCoordinator::new();
    let signal_listener = shutdown.shutdown_on_signal();
    let report = server.run(shutdown.cancelled()).await;
    if !shutdown.is_shutting_down() {
        warn!("listener stopped without a shutdown request");
        shutdown.shutdown();
    }
    let _ = signal_listener.await;

    info!(
        closed_connections = report.closed_connections,
        drained = report.drained,
        "shutdown complete"
    );
    Ok(())
}
