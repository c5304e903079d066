//! Write side of one accepted connection.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// The writable half of a peer socket plus its close signal.
///
/// The read half lives in the session task. [`Connection::close`] cancels
/// the token that task selects on, so a forced close looks to the session
/// like any other read failure.
pub struct Connection<W> {
    writer: Option<W>,
    closed: CancellationToken,
}

impl<W: AsyncWrite + Unpin> Connection<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            closed: CancellationToken::new(),
        }
    }

    /// Token cancelled when this connection is closed.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Write `text` and flush, giving up after `timeout`.
    ///
    /// Any failure closes the connection: the peer may hold part of `text`,
    /// and nothing may be appended to a torn line.
    pub async fn write_text(&mut self, text: &str, timeout: Duration) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        };
        let write = async {
            writer.write_all(text.as_bytes()).await?;
            writer.flush().await
        };
        let result = match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        };
        if result.is_err() {
            self.abandon();
        }
        result
    }

    /// Drop the writer without a graceful shutdown, which could stall on a
    /// peer that stopped reading.
    fn abandon(&mut self) {
        self.closed.cancel();
        drop(self.writer.take());
    }

    /// Close the connection. Returns `false` if it was already closed.
    ///
    /// Safe to call any number of times from either closer.
    pub async fn close(&mut self) -> bool {
        self.closed.cancel();
        match self.writer.take() {
            Some(mut writer) => {
                // Peer may already be gone; nothing useful to do with the error.
                let _ = writer.shutdown().await;
                true
            }
            None => false,
        }
    }
}
