//! Cooperative cancellation
//!
//! A level-triggered flag paired with an edge-triggered wake. The flag keeps
//! an interrupt that lands between a turn's select iterations from being
//! lost, and makes repeated interrupts idempotent; the wake lets a turn that
//! is suspended on its agent observe it without polling. The agent loop
//! clears the flag when a turn starts, so an interrupt issued while idle
//! does not carry over into the next turn.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cancellation flag plus wake primitive for one session
#[derive(Debug, Default)]
pub struct CancelSignal {
    flag: AtomicBool,
    wake: Notify,
}

impl CancelSignal {
    /// Create a cleared signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter
    ///
    /// Returns `false` when cancellation was already pending.
    pub fn interrupt(&self) -> bool {
        if self.flag.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.wake.notify_waiters();
        true
    }

    /// Whether cancellation is pending
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a pending cancellation
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Resolve once cancellation is pending
    pub async fn cancelled(&self) {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register before checking the flag so an interrupt landing in
            // between still wakes us.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
