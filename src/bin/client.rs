//! # huddle-client
//!
//! Terminal client: prints whatever the server sends and forwards each line
//! typed on stdin.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use huddle_client::ClientConfig;
use huddle_core::wait_for_shutdown_signal;
use huddle_logging::{LogFormat, LoggingConfig, init_logging};
use tracing::{Level, debug};

/// Chat relay client.
#[derive(Parser, Debug)]
#[command(name = "huddle-client", about = "Line-based TCP chat relay client")]
struct Cli {
    /// Server address, `host:port` (default `localhost:9000`).
    addr: Option<String>,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = init_logging(&LoggingConfig {
        level: Level::WARN,
        format: cli.log_format,
        ..LoggingConfig::default()
    });

    let config = ClientConfig {
        server_addr: cli.addr.unwrap_or_else(|| ClientConfig::default().server_addr),
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(huddle_client::run(
        &config,
        tokio::io::stdin(),
        tokio::io::stdout(),
        async {
            let _ = wait_for_shutdown_signal().await;
        },
    ));
    // The stdin reader thread may still be blocked on a read; don't wait for it.
    runtime.shutdown_background();

    let reason = result.context("Chat client failed")?;
    debug!(?reason, "client exited");
    Ok(())
}
