//! Keepalive timing and the pong-driven read deadline.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Timing for protocol pings, liveness, and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Interval between protocol pings.
    pub ping_interval: Duration,
    /// How long a read may wait without a pong before the session is dead.
    pub read_deadline: Duration,
    /// How long shutdown waits for the read loop after the close frame.
    pub close_grace: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            read_deadline: Duration::from_secs(60),
            close_grace: Duration::from_secs(1),
        }
    }
}

impl KeepaliveConfig {
    /// Check the timings are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.ping_interval.is_zero() {
            return Err("ping interval must be greater than 0".to_string());
        }
        if self.read_deadline <= self.ping_interval {
            return Err("read deadline must be longer than the ping interval".to_string());
        }
        if self.close_grace.is_zero() {
            return Err("close grace must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Liveness deadline, pushed forward each time a pong arrives.
#[derive(Debug)]
pub(crate) struct ReadDeadline {
    window: Duration,
    expires_at: Mutex<Instant>,
}

impl ReadDeadline {
    /// Start a deadline one window from now.
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            expires_at: Mutex::new(Instant::now() + window),
        }
    }

    /// Extend the deadline to one window from now.
    pub(crate) fn refresh(&self) {
        *self.expires_at.lock() = Instant::now() + self.window;
    }

    /// Instant at which the next read gives up.
    pub(crate) fn expires_at(&self) -> Instant {
        *self.expires_at.lock()
    }

    pub(crate) const fn window(&self) -> Duration {
        self.window
    }
}
