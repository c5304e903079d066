//! Server error types.

use std::io;

use crate::config::ConfigError;

/// Errors surfaced by [`ChatServer`](crate::ChatServer).
///
/// Per-connection I/O failures never reach this type; they only end the
/// session that hit them.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Socket-level failure outside any session.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The background server task panicked or was aborted.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
