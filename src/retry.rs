//! Exponential backoff for backend bootstrap
//!
//! Connecting to the bus and the store is retried with exponentially growing
//! delays until `max_elapsed` runs out. A bootstrap that never succeeds is
//! fatal at startup; steady-state request handling never retries here.

use crate::error::{IngestError, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Backoff settings for connection bootstrap
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap for a single delay
    pub max_delay: Duration,
    /// Give up once this much time has passed since the first attempt
    pub max_elapsed: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds or the elapsed budget is spent
///
/// The last error is wrapped in `IngestError::Connection`.
pub async fn retry_with_backoff<T, F, Fut>(what: &str, config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(target_service = what, attempts = attempt + 1, "Connected after retries");
                }
                return Ok(value);
            }
            Err(e) => {
                let delay = config.delay_for(attempt);
                if started.elapsed() + delay > config.max_elapsed {
                    return Err(IngestError::Connection(format!(
                        "{} unavailable after {} attempts: {}",
                        what,
                        attempt + 1,
                        e
                    )));
                }
                tracing::warn!(
                    target_service = what,
                    attempt = attempt + 1,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Connection attempt failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
