//! # huddle-client
//!
//! Thin bidirectional pipe for the huddle chat relay: stdin lines go to the
//! socket, socket bytes go to stdout.

#![deny(unsafe_code)]

use std::future::Future;
use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server to connect to (default `"localhost:9000"`).
    pub server_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "localhost:9000".into(),
        }
    }
}

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Local output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why the session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The server closed the connection.
    ServerClosed,
    /// Local input reached EOF or the socket refused further writes.
    InputClosed,
    /// The shutdown future fired (Ctrl-C).
    Interrupted,
}

/// Connect to the configured server and pipe until one side ends.
pub async fn run<I, O, F>(
    config: &ClientConfig,
    input: I,
    mut output: O,
    shutdown: F,
) -> Result<ExitReason, ClientError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let stream = TcpStream::connect(&config.server_addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: config.server_addr.clone(),
            source,
        })?;
    info!(addr = %config.server_addr, "connected");

    let greeting = format!(
        "Connected to {}\nType messages and press Enter. Ctrl+C to exit.\n",
        config.server_addr
    );
    output.write_all(greeting.as_bytes()).await?;
    output.flush().await?;

    pipe(stream, input, output, shutdown).await
}

/// Shuttle bytes between `stream` and the local terminal.
///
/// Server bytes are copied as-is so the unterminated name prompt shows up
/// immediately. Input is forwarded one line at a time.
pub async fn pipe<S, I, O, F>(
    stream: S,
    input: I,
    mut output: O,
    shutdown: F,
) -> Result<ExitReason, ClientError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let (mut from_server, mut to_server) = tokio::io::split(stream);

    let reason = {
        let inbound = tokio::io::copy(&mut from_server, &mut output);
        let outbound = forward_lines(input, &mut to_server);
        tokio::select! {
            copied = inbound => {
                match copied {
                    Ok(bytes) => debug!(bytes, "server closed the connection"),
                    Err(e) => warn!(error = %e, "server read error"),
                }
                ExitReason::ServerClosed
            }
            sent = outbound => {
                if let Err(e) = sent {
                    warn!(error = %e, "write error");
                }
                ExitReason::InputClosed
            }
            () = shutdown => ExitReason::Interrupted,
        }
    };

    match reason {
        ExitReason::ServerClosed => output.write_all(b"Disconnected from server.\n").await?,
        ExitReason::Interrupted => {
            output
                .write_all(b"\nClosing connection and exiting...\n")
                .await?;
        }
        ExitReason::InputClosed => {}
    }
    output.flush().await?;
    // Server may already be gone.
    let _ = to_server.shutdown().await;
    Ok(reason)
}

async fn forward_lines<I, W>(input: I, socket: &mut W) -> io::Result<()>
where
    I: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        socket.write_all(line.as_bytes()).await?;
        socket.write_all(b"\n").await?;
        socket.flush().await?;
    }
    Ok(())
}
