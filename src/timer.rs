//! Retransmission timer.
//!
//! Go-Back-N uses a single timer for the whole window.  [`RetransmitTimer`]
//! is a monotonic deadline that the sender arms, restarts, and cancels; the
//! driver polls it through [`crate::sender::Sender::tick`].
//!
//! Time is read from [`tokio::time::Instant`], so tests running on a paused
//! runtime can move the clock with `tokio::time::advance`.  Every method
//! takes `now` explicitly; the timer never reads the clock itself.

use std::time::Duration;

use tokio::time::Instant;

/// Default retransmission timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A single-deadline timer for the oldest outstanding window.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start (or restart) the timer so it expires `timeout` after `now`.
    ///
    /// Restarting replaces the old deadline; it never extends it.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the timer is armed and at least `timeout` has elapsed.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
