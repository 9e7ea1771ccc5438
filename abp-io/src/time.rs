//! Timing utilities for the emulator
//!
//! Provides the monotonic retransmission timer used by the sender while it
//! waits for an acknowledgement.

use std::time::{Duration, Instant};

/// Monotonic retransmission timer
///
/// The timer is armed each time a data unit goes out. It is considered
/// expired once strictly more than `interval` has elapsed since the last
/// arm, which is the condition the sender polls on every engine tick.
#[derive(Debug, Clone)]
pub struct Timer {
    interval: Duration,
    armed_at: Instant,
}

impl Timer {
    /// Create a new timer with the given interval, armed now
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            armed_at: Instant::now(),
        }
    }

    /// Get the timer interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Re-arm the timer from the current instant
    pub fn arm(&mut self) {
        self.armed_at = Instant::now();
    }

    /// Re-arm the timer from a given instant
    pub fn arm_at(&mut self, now: Instant) {
        self.armed_at = now;
    }

    /// Time elapsed since the timer was last armed
    pub fn elapsed(&self) -> Duration {
        self.armed_at.elapsed()
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    /// Check if the timer had expired at `now`
    pub fn expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.armed_at) > self.interval
    }
}
