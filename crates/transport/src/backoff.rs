//! Bounded exponential backoff for opening the stream.

use std::time::Duration;

use agora_core::TransportError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::stream::StreamClient;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Total connection attempts; zero is treated as one.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Try `stream.connect()` until it succeeds, attempts run out, or `cancel` fires.
///
/// Returns the last connect error when every attempt fails, and
/// [`TransportError::NotConnected`] when cancelled while waiting.
pub async fn connect_with_backoff(
    stream: &StreamClient,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::NotConnected),
            result = stream.connect() => result,
        };

        let err = match result {
            Ok(()) => {
                if attempt > 1 {
                    info!(attempt, "Stream connected after retry");
                }
                return Ok(());
            }
            Err(e) => e,
        };

        if attempt >= attempts {
            warn!(attempt, error = %err, "Giving up on stream connection");
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Stream connect failed, retrying");
        tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::NotConnected),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
