//! `ChatServer`: listener, accept loop and the shutdown sequence.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, info, info_span, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::Registry;
use crate::session::run_session;
use crate::shutdown::{ShutdownCoordinator, drain};

/// Registry type used for real TCP peers.
pub type TcpRegistry = Registry<OwnedWriteHalf>;

/// Outcome of a completed [`ChatServer::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections that were still open when shutdown closed them.
    pub closed_connections: usize,
    /// Whether every session finished cleanup within the grace period.
    pub drained: bool,
}

/// A bound chat server, ready to [`run`](Self::run).
pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<TcpRegistry>,
    config: Arc<ServerConfig>,
    sessions: TaskTracker,
}

impl ChatServer {
    /// Bind the configured listen address.
    ///
    /// Failure here is fatal for the process; there is no retry.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        let registry = Arc::new(Registry::new(config.write_timeout()));
        Ok(Self {
            listener,
            registry,
            config: Arc::new(config),
            sessions: TaskTracker::new(),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &Arc<TcpRegistry> {
        &self.registry
    }

    /// Accept connections until `shutdown` resolves or accepting fails.
    ///
    /// Then, in order: drop the listener so nothing new is admitted, close
    /// every tracked connection under the registry lock, and give sessions
    /// the configured grace period to finish their cleanup.
    pub async fn run<F>(self, shutdown: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            registry,
            config,
            sessions,
        } = self;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "chat server listening");
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => admit(stream, peer, &registry, &config, &sessions).await,
                    Err(e) => {
                        warn!(error = %e, "accept failed, no longer accepting");
                        break;
                    }
                },
            }
        }

        drop(listener);
        let closed_connections = registry.close_all().await;
        info!(closed_connections, "closed all connections");
        let drained = drain(&sessions, config.shutdown_grace()).await;
        info!(drained, "chat server stopped");

        ShutdownReport {
            closed_connections,
            drained,
        }
    }

    /// Run on a background task, stoppable through the returned handle.
    pub fn spawn(self) -> Result<ServerHandle, ServerError> {
        let local_addr = self.local_addr()?;
        let registry = Arc::clone(&self.registry);
        let shutdown = ShutdownCoordinator::new();
        let task = tokio::spawn(self.run(shutdown.cancelled()));
        Ok(ServerHandle {
            local_addr,
            registry,
            shutdown,
            task,
        })
    }
}

async fn admit(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &Arc<TcpRegistry>,
    config: &Arc<ServerConfig>,
    sessions: &TaskTracker,
) {
    let (reader, writer) = stream.into_split();
    let (id, closed) = registry.register(writer).await;
    info!(conn_id = %id, %peer, "connection accepted");

    let span = info_span!("session", conn_id = %id, %peer);
    let _ = sessions.spawn(
        run_session(
            Arc::clone(registry),
            id,
            reader,
            closed,
            Arc::clone(config),
        )
        .instrument(span),
    );
}

/// Handle to a server started with [`ChatServer::spawn`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<TcpRegistry>,
    shutdown: ShutdownCoordinator,
    task: JoinHandle<ShutdownReport>,
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared connection registry.
    pub fn registry(&self) -> &Arc<TcpRegistry> {
        &self.registry
    }

    /// Start the shutdown sequence.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Wait for the server task to finish.
    pub async fn join(self) -> Result<ShutdownReport, ServerError> {
        Ok(self.task.await?)
    }
}
