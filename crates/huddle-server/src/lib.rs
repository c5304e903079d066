//! # huddle-server
//!
//! Line-based TCP chat relay.
//!
//! - [`registry`]: the one lock-guarded map of live connections, and every
//!   socket write
//! - [`session`]: per-connection handshake, relay loop and cleanup
//! - [`server`]: accept loop and the ordered shutdown sequence
//! - [`shutdown`]: cancellation handle for triggering shutdown in-process
//! - [`config`]: layered server configuration

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::{ConfigError, ServerConfig};
pub use error::ServerError;
pub use registry::Registry;
pub use server::{ChatServer, ServerHandle, ShutdownReport};
pub use shutdown::ShutdownCoordinator;
