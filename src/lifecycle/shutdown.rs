//! Shutdown coordination for the relay.

use std::sync::Arc;
use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// A level-triggered flag: once triggered it stays set, so tasks that start
/// waiting late still observe it. Clones share the same flag.
#[derive(Clone)]
pub struct Shutdown {
    /// Watch channel sender holding the flag.
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Get the number of active subscribers (tasks still waiting).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
