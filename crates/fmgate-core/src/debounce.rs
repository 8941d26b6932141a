//! Single-slot coalescing trigger
//!
//! Collapses a burst of change notifications into one firing a fixed window
//! after the last poke. Used for the 500 ms configuration reload debounce
//! and the 10 s transport liveness grace timer.

use tokio::time::{sleep_until, Duration, Instant};

/// A timer that fires once per burst of pokes.
///
/// At most one firing is ever pending: poking while armed restarts the
/// window instead of queueing a second firing.
#[derive(Debug)]
pub struct Coalescer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the trigger, restarting the window from now.
    pub fn poke(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the armed window to elapse, then disarm.
    ///
    /// Pends forever while disarmed, so this is safe to poll from a
    /// `select!` arm alongside the event source being debounced. The
    /// deadline is absolute; dropping and re-creating this future does not
    /// extend the window.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
