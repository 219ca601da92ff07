//! Single-fire completion latch handed out for queued commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    fired: AtomicBool,
    notify: Notify,
}

/// Latch that fires once the scheduler has transmitted a command.
///
/// Clones share the same latch. A command discarded from the queue never
/// fires its signal, so an unbounded [`wait`](Self::wait) on it never
/// returns; use [`wait_timeout`](Self::wait_timeout) where that matters.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the latch and wake every waiter
    pub(crate) fn fire(&self) {
        self.inner.fired.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether the latch has fired
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Wait until the latch fires
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_fired() {
                return;
            }
            notified.await;
        }
    }

    /// Wait at most `limit` for the latch; returns whether it fired
    pub async fn wait_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_wait_completes_after_fire() {
        let signal = CompletionSignal::new();
        let mut waiter = task::spawn(signal.wait());
        assert_pending!(waiter.poll());

        signal.clone().fire();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
        assert!(signal.is_fired());
    }

    #[test]
    fn test_wait_after_fire_is_immediate() {
        let signal = CompletionSignal::new();
        signal.fire();
        let mut waiter = task::spawn(signal.wait());
        assert_ready!(waiter.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_without_fire() {
        let signal = CompletionSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(50)).await);
    }
}
