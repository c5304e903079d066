//! Shutdown triggering and session draining.

use std::time::Duration;

use huddle_core::wait_for_shutdown_signal;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Cancellation handle that starts the server's shutdown sequence.
///
/// Lets tests stop a server in-process instead of sending it a real signal.
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initiate shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future resolving once [`shutdown`](Self::shutdown) is called.
    pub fn cancelled(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    /// Trigger shutdown on the first SIGINT/SIGTERM.
    pub fn shutdown_on_signal(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = wait_for_shutdown_signal() => {
                    info!(%signal, "shutdown signal received");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        })
    }
}

/// Close `tracker` and wait up to `grace` for its tasks.
///
/// Returns `false` if some tasks were still running at the deadline.
pub async fn drain(tracker: &TaskTracker, grace: Duration) -> bool {
    let _ = tracker.close();
    info!(
        task_count = tracker.len(),
        grace_ms = grace.as_millis() as u64,
        "waiting for sessions to finish"
    );
    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        warn!(
            remaining = tracker.len(),
            "shutdown grace period elapsed with sessions still running"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn multiple_shutdown_calls_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn clones_share_state() {
        let coord = ShutdownCoordinator::new();
        let other = coord.clone();
        other.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_shutdown() {
        let coord = ShutdownCoordinator::new();
        let waiter = tokio::spawn(coord.cancelled());
        coord.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn signal_listener_exits_on_manual_shutdown() {
        let coord = ShutdownCoordinator::new();
        let listener = coord.shutdown_on_signal();
        coord.shutdown();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn drain_waits_for_tracked_tasks() {
        let tracker = TaskTracker::new();
        let coord = ShutdownCoordinator::new();
        let done = coord.cancelled();
        let _ = tracker.spawn(done);
        coord.shutdown();

        assert!(drain(&tracker, Duration::from_secs(1)).await);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_times_out() {
        let tracker = TaskTracker::new();
        let _ = tracker.spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        assert!(!drain(&tracker, Duration::from_millis(100)).await);
    }
}
