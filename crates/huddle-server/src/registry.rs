//! Shared registry of live connections.
//!
//! One `tokio::sync::Mutex` guards the map. Every mutation and every socket
//! write happens while holding it, so broadcasts are totally ordered and each
//! one reaches exactly the sessions present when its lock was taken.
//!
//! Entries are inserted at accept time without a [`Profile`] so shutdown can
//! close them. Only entries with a profile (handshake complete) receive
//! broadcasts.

use std::collections::HashMap;
use std::time::Duration;

use huddle_core::{ConnectionId, Profile};
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::Connection;

struct Entry<W> {
    connection: Connection<W>,
    profile: Option<Profile>,
}

/// What [`Registry::unregister`] hands back. The caller closes the connection
/// after the lock is released.
pub struct Unregistered<W> {
    /// The removed connection, possibly already closed by shutdown.
    pub connection: Connection<W>,
    /// Set if the handshake had completed.
    pub profile: Option<Profile>,
}

/// Lock-guarded map of accepted connections.
pub struct Registry<W> {
    entries: Mutex<HashMap<ConnectionId, Entry<W>>>,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin + Send> Registry<W> {
    /// Create an empty registry. Each socket write is bounded by `write_timeout`.
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            write_timeout,
        }
    }

    /// Track a freshly accepted connection.
    ///
    /// Returns its id and the token that fires when the connection is closed.
    pub async fn register(&self, writer: W) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId::new();
        let connection = Connection::new(writer);
        let token = connection.close_token();
        let mut entries = self.entries.lock().await;
        let _ = entries.insert(
            id.clone(),
            Entry {
                connection,
                profile: None,
            },
        );
        (id, token)
    }

    /// Attach the session profile. Returns `false` if the entry is gone.
    pub async fn set_profile(&self, id: &ConnectionId, profile: Profile) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.profile = Some(profile);
                true
            }
            None => false,
        }
    }

    /// Profile of a connection, if it has one.
    pub async fn profile(&self, id: &ConnectionId) -> Option<Profile> {
        let entries = self.entries.lock().await;
        entries.get(id).and_then(|e| e.profile.clone())
    }

    /// Write `text` to one connection.
    pub async fn send_to(&self, id: &ConnectionId, text: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        match entry.connection.write_text(text, self.write_timeout).await {
            Ok(()) => true,
            Err(e) => {
                debug!(conn_id = %id, error = %e, "write failed");
                false
            }
        }
    }

    /// Write `text` to every connection that has completed its handshake.
    ///
    /// A failed write closes that connection, which ends its session through
    /// the normal leave path. Returns how many writes succeeded.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let mut delivered = 0;
        for (id, entry) in entries.iter_mut() {
            if entry.profile.is_none() {
                continue;
            }
            match entry.connection.write_text(text, self.write_timeout).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(conn_id = %id, error = %e, "broadcast write failed"),
            }
        }
        delivered
    }

    /// Remove a connection. A missing id is a no-op and returns `None`.
    pub async fn unregister(&self, id: &ConnectionId) -> Option<Unregistered<W>> {
        let mut entries = self.entries.lock().await;
        entries.remove(id).map(|entry| Unregistered {
            connection: entry.connection,
            profile: entry.profile,
        })
    }

    /// Close every tracked connection, leaving the entries for their sessions
    /// to remove. Returns how many were open.
    pub async fn close_all(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let mut closed = 0;
        for entry in entries.values_mut() {
            if entry.connection.close().await {
                closed += 1;
            }
        }
        closed
    }

    /// Number of tracked connections, handshaking or active.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Number of active sessions.
    pub async fn session_count(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.profile.is_some()).count()
    }

    /// Sorted names of active sessions.
    pub async fn names(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut names: Vec<String> = entries
            .values()
            .filter_map(|e| e.profile.as_ref().map(|p| p.name.clone()))
            .collect();
        names.sort();
        names
    }
}
