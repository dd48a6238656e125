//! One-shot readiness gate
//!
//! Callers that depend on a capability becoming available (the host finishing
//! initialization, the viewer's renderer loading) await the gate instead of
//! polling for it.

use std::sync::Arc;

use tokio::sync::watch;

/// Clonable gate that opens once and stays open
#[derive(Debug, Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<bool>>,
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A gate that is already open
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.mark_ready();
        gate
    }

    /// Open the gate. Idempotent.
    pub fn mark_ready(&self) {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the gate is open; immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
