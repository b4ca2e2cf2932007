//! Idle-completion barrier shared by the background queues.

use tokio::sync::watch;

/// Tracks whether a queue is fully drained (nothing pending, nothing in flight).
///
/// The owning queue flips the barrier under its own state lock, so the value
/// observed here always matches `pending == 0 && in_flight == 0`. A barrier
/// starts idle and re-arms as soon as work is accepted.
#[derive(Debug)]
pub struct IdleBarrier {
    idle: watch::Sender<bool>,
}

impl IdleBarrier {
    pub fn new() -> Self {
        let (idle, _) = watch::channel(true);
        Self { idle }
    }

    /// Update the barrier. Waiters are only woken on an actual change.
    pub fn set_idle(&self, idle: bool) {
        self.idle.send_if_modified(|current| {
            if *current == idle {
                false
            } else {
                *current = idle;
                true
            }
        });
    }

    pub fn is_idle(&self) -> bool {
        *self.idle.borrow()
    }

    /// Resolve once the barrier is idle. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.idle.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl Default for IdleBarrier {
    fn default() -> Self {
        Self::new()
    }
}
