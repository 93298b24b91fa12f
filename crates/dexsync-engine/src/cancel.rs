//! Lifecycle token shared by the engine's tasks.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Notify;

/// Teardown flag that can be cloned into every spawned task.
///
/// Cancellation is logical: tasks check the flag before publishing results and
/// long-lived watchers select on [`Lifecycle::torn_down`].
#[derive(Clone)]
pub struct Lifecycle {
    torn_down: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Lifecycle {
    /// Create a live lifecycle.
    pub fn new() -> Self {
        Self {
            torn_down: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns `true` once teardown has been requested.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Request teardown and wake any waiters.
    ///
    /// Returns `false` if the lifecycle was already torn down.
    pub fn teardown(&self) -> bool {
        let first = !self.torn_down.swap(true, Ordering::AcqRel);
        self.notify.notify_waiters();
        first
    }

    /// Await until teardown is requested.
    pub async fn torn_down(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent teardown is not missed.
        notified.as_mut().enable();
        if self.is_torn_down() {
            return;
        }
        notified.await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
