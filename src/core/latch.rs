//! One-shot shutdown signal.

use tokio::sync::watch;

/// A flag that transitions from unset to set exactly once and never resets.
///
/// Any number of tasks can test it or wait for it; triggering is idempotent.
#[derive(Debug)]
pub struct Latch {
    state: watch::Sender<bool>,
}

impl Latch {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Set the latch. Returns `true` only for the call that actually set it.
    pub fn trigger(&self) -> bool {
        self.state.send_if_modified(|set| {
            if *set {
                false
            } else {
                *set = true;
                true
            }
        })
    }

    pub fn is_set(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the latch is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = receiver.wait_for(|set| *set).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    #[test]
    fn test_trigger_once() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert!(latch.trigger());
        assert!(latch.is_set());
        assert!(!latch.trigger());
        assert!(latch.is_set());
    }

    #[tokio::test]
    async fn test_wait_releases_all_waiters() {
        let latch = Arc::new(Latch::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let latch = latch.clone();
            handles.push(tokio::spawn(async move { latch.wait().await }));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        latch.trigger();

        for handle in handles {
            let result = timeout(Duration::from_millis(200), handle).await;
            assert!(result.is_ok(), "waiter should be released by trigger");
        }
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let latch = Latch::new();
        latch.trigger();
        let result = timeout(Duration::from_millis(50), latch.wait()).await;
        assert!(result.is_ok());
    }
}
