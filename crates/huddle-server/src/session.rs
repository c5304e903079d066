//! Per-connection session: handshake, relay loop, cleanup.
//!
//! ```text
//! Handshaking --name--> Active --EOF / error / close--> Terminated
//!      \------------EOF / error / close------------------^ (silent)
//! ```
//!
//! A session that never finished its handshake leaves without a join or
//! leave line. One that did always announces its departure exactly once.

use std::io;
use std::sync::Arc;

use huddle_core::wire::trim_line_ending;
use huddle_core::{ChatLine, ConnectionId, Profile, pick_color};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::registry::Registry;

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the name line.
    Handshaking,
    /// Joined and relaying lines.
    Active,
    /// Cleaned up.
    Terminated,
}

/// Newline-delimited reader with a per-line size cap.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap `reader`; lines longer than `max_line_bytes` are an error.
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            max_line_bytes,
        }
    }

    /// Next line without its terminator, or `None` at EOF.
    ///
    /// A final unterminated line is still returned. Invalid UTF-8 is replaced
    /// rather than rejected.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        // Room for the longest allowed line plus "\r\n".
        let limit = (self.max_line_bytes as u64).saturating_add(2);
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        let terminated = self.buf.last() == Some(&b'\n');
        let text = String::from_utf8_lossy(&self.buf);
        let line = trim_line_ending(&text);
        // Measure the raw bytes; lossy replacement can only grow the text.
        let raw_len = self.buf.len() - (text.len() - line.len());
        if raw_len > self.max_line_bytes || (!terminated && n as u64 == limit) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
        }
        Ok(Some(line.to_owned()))
    }
}

/// Read one line, treating a closed connection like EOF.
async fn read_line<R: AsyncRead + Unpin>(
    lines: &mut LineReader<R>,
    closed: &CancellationToken,
) -> Option<String> {
    tokio::select! {
        biased;
        () = closed.cancelled() => {
            debug!("connection closed while reading");
            None
        }
        read = lines.next_line() => match read {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "read failed");
                None
            }
        },
    }
}

/// Drive one connection from prompt to cleanup.
///
/// The connection must already be registered under `id`.
pub async fn run_session<R, W>(
    registry: Arc<Registry<W>>,
    id: ConnectionId,
    reader: R,
    closed: CancellationToken,
    config: Arc<ServerConfig>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = LineReader::new(reader, config.max_line_bytes);

    let Some(profile) = handshake(&registry, &id, &mut lines, &closed, &config).await else {
        if let Some(mut gone) = registry.unregister(&id).await {
            let _ = gone.connection.close().await;
        }
        debug!(phase = ?Phase::Terminated, "handshake abandoned");
        return;
    };

    info!(name = %profile.name, color = profile.color.name(), "joined");
    let _ = registry.broadcast(&ChatLine::Joined(&profile).render()).await;

    while let Some(text) = read_line(&mut lines, &closed).await {
        let delivered = registry
            .broadcast(&ChatLine::Said(&profile, &text).render())
            .await;
        debug!(delivered, "relayed line");
    }

    cleanup(&registry, &id).await;
}

async fn handshake<R, W>(
    registry: &Registry<W>,
    id: &ConnectionId,
    lines: &mut LineReader<R>,
    closed: &CancellationToken,
    config: &ServerConfig,
) -> Option<Profile>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    debug!(phase = ?Phase::Handshaking, "sending name prompt");
    if !registry.send_to(id, &config.name_prompt).await {
        return None;
    }
    let name = read_line(lines, closed).await?;
    let profile = Profile::new(name, pick_color());
    if !registry.set_profile(id, profile.clone()).await {
        return None;
    }
    debug!(phase = ?Phase::Active, "handshake complete");
    Some(profile)
}

async fn cleanup<W: AsyncWrite + Unpin + Send>(registry: &Registry<W>, id: &ConnectionId) {
    let Some(mut gone) = registry.unregister(id).await else {
        return;
    };
    let _ = gone.connection.close().await;

    if let Some(profile) = gone.profile {
        info!(name = %profile.name, phase = ?Phase::Terminated, "left");
        let _ = registry.broadcast(&ChatLine::Left(&profile).render()).await;
    }
}
