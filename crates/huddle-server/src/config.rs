//! Server configuration.
//!
//! Loading flow:
//! 1. Start with [`ServerConfig::default()`]
//! 2. If a JSON file is given, its keys override the defaults
//! 3. `HUDDLE_*` environment variables override both
//!
//! The binary applies CLI flags last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable overriding [`ServerConfig::listen_addr`].
pub const ENV_ADDR: &str = "HUDDLE_ADDR";
/// Environment variable overriding [`ServerConfig::write_timeout_ms`].
pub const ENV_WRITE_TIMEOUT_MS: &str = "HUDDLE_WRITE_TIMEOUT_MS";
/// Environment variable overriding [`ServerConfig::shutdown_grace_ms`].
pub const ENV_SHUTDOWN_GRACE_MS: &str = "HUDDLE_SHUTDOWN_GRACE_MS";
/// Environment variable overriding [`ServerConfig::max_line_bytes`].
pub const ENV_MAX_LINE_BYTES: &str = "HUDDLE_MAX_LINE_BYTES";

/// Largest accepted [`ServerConfig::max_line_bytes`].
pub const MAX_LINE_BYTES_CEILING: usize = 16 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ServerConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that was requested.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the chat server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on (default `"0.0.0.0:9000"`).
    pub listen_addr: String,
    /// Prompt written to a new connection. No trailing newline.
    pub name_prompt: String,
    /// Upper bound on a single write to one peer, in milliseconds.
    pub write_timeout_ms: u64,
    /// How long shutdown waits for sessions to finish cleanup, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Longest accepted line, excluding the terminator.
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".into(),
            name_prompt: "Enter your name: ".into(),
            write_timeout_ms: 5_000,
            shutdown_grace_ms: 2_000,
            max_line_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Defaults, then the optional file, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file. Missing keys keep their defaults; unknown keys are
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading server config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `HUDDLE_*` overrides read through `lookup`.
    ///
    /// Values that are empty or do not parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_ADDR).filter(|v| !v.is_empty()) {
            self.listen_addr = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_WRITE_TIMEOUT_MS, 1, 3_600_000) {
            self.write_timeout_ms = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_SHUTDOWN_GRACE_MS, 0, 3_600_000) {
            self.shutdown_grace_ms = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_MAX_LINE_BYTES, 1, MAX_LINE_BYTES_CEILING as u64) {
            self.max_line_bytes = v as usize;
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("listen_addr is empty".into()));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("write_timeout_ms must be > 0".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("max_line_bytes must be > 0".into()));
        }
        if self.max_line_bytes > MAX_LINE_BYTES_CEILING {
            return Err(ConfigError::Invalid(format!(
                "max_line_bytes must be <= {MAX_LINE_BYTES_CEILING}"
            )));
        }
        Ok(())
    }
}

fn parse_env(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    min: u64,
    max: u64,
) -> Option<u64> {
    let raw = lookup(key)?;
    let parsed = raw
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v));
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid numeric env var, ignoring");
    }
    parsed
}
