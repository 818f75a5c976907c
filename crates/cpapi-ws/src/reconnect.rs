//! Exponential backoff for redialing a gateway.
//!
//! The session never redials on its own. Callers that want to survive an
//! abnormal closure wrap their dial in [`reconnect_with_backoff`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::WsError;

/// Backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectConfig {
    /// Delay after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        if !millis.is_finite() || millis >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(millis as u64)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    #[must_use]
    pub const fn should_reconnect(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }
}

/// Whether an error is worth another dial. Configuration and state errors
/// will fail the same way every time.
#[must_use]
pub const fn is_retryable(err: &WsError) -> bool {
    !matches!(
        err,
        WsError::Config(_) | WsError::InvalidState(_) | WsError::AlreadySubscribed(_)
    )
}

/// Run `connect_fn` until it succeeds, the error is not retryable, or the
/// schedule runs out.
pub async fn reconnect_with_backoff<F, Fut, T>(
    config: &ReconnectConfig,
    mut connect_fn: F,
) -> Result<T, WsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WsError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match connect_fn().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "reconnected");
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) || !config.should_reconnect(attempt) => {
                warn!(attempt, error = %e, "giving up on gateway");
                return Err(e);
            }
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(attempt, ?delay, error = %e, "dial failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
