//! Delayed, cancellable replay-prompt timer.
//!
//! When the engine announces a winner the client waits a few seconds (long
//! enough to show the celebration) before offering "play again?". The
//! [`ReplayPromptScheduler`] owns that single timer as an explicit handle:
//! arming is level-triggered (a second `game-over` while armed does not stack
//! a second timer) and cancelling is idempotent, so a `game-reset` or a view
//! teardown can always call [`cancel`](ReplayPromptScheduler::cancel) safely.
//!
//! The fire is delivered as a `()` on an unbounded channel so the transport
//! loop can pick it up inside its `tokio::select!`. A fire that raced a
//! cancellation is filtered at the receiving end, where the session checks
//! that a winner is still set.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

/// Default delay between the winner announcement and the replay prompt.
pub const DEFAULT_PROMPT_DELAY: Duration = Duration::from_secs(5);

/// Owns the single delayed "show the replay prompt" action.
#[derive(Debug)]
pub struct ReplayPromptScheduler {
    delay: Duration,
    fire_tx: mpsc::UnboundedSender<()>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl ReplayPromptScheduler {
    /// Create a scheduler that reports fires on `fire_tx` after `delay`.
    pub fn new(delay: Duration, fire_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            delay,
            fire_tx,
            handle: None,
        }
    }

    /// Schedule the prompt, unless one is already pending.
    ///
    /// Keyed on "a winner is currently set", not on each inbound message:
    /// arming while armed is a no-op.
    pub fn arm(&mut self) {
        if self.is_armed() {
            debug!("replay prompt already scheduled, not stacking a second timer");
            return;
        }
        let delay = self.delay;
        let tx = self.fire_tx.clone();
        debug!(?delay, "replay prompt scheduled");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the loop is tearing down; nothing to do.
            let _ = tx.send(());
        }));
    }

    /// Cancel a pending fire. Safe to call when nothing is armed, and safe to
    /// call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("replay prompt cancelled");
        }
    }

    /// Whether a fire is still pending.
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReplayPromptScheduler {
    fn drop(&mut self) {
        // Teardown must never leave a timer pending after the owner is gone.
        self.cancel();
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_the_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(20), tx);
        scheduler.arm();
        assert!(scheduler.is_armed());

        let fired = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(fired.is_ok(), "expected the timer to fire");
    }

    #[tokio::test]
    async fn cancel_prevents_the_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(50), tx);
        scheduler.arm();
        scheduler.cancel();
        assert!(!scheduler.is_armed());

        // Wait past the original deadline — nothing may arrive.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err(), "cancelled timer must not fire");
    }

    #[tokio::test]
    async fn arming_twice_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(20), tx);
        scheduler.arm();
        scheduler.arm();

        let _ = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "second arm must not stack a fire");
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(20), tx);
        scheduler.cancel();
        scheduler.arm();
        scheduler.cancel();
        scheduler.cancel();
        assert!(!scheduler.is_armed());
    }

    #[tokio::test]
    async fn can_rearm_after_a_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(10), tx);
        scheduler.arm();
        let _ = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(!scheduler.is_armed());

        scheduler.arm();
        let fired = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(fired.is_ok(), "re-arming after a fire must work");
    }

    #[tokio::test]
    async fn drop_aborts_a_pending_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut scheduler = ReplayPromptScheduler::new(Duration::from_millis(30), tx);
            scheduler.arm();
        }
        tokio::time::sleep(Duration::from_millis(80)).await;
        // Sender dropped with the scheduler, so recv yields None without a fire.
        assert!(rx.try_recv().is_err());
    }
}
