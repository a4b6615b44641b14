//! Retry with exponential backoff for transient storage failures
//!
//! Only `TransientStorage` errors are retried. The delay before retry `n`
//! (1-based) is `base * 2^(n-1)`, scaled by a random factor in 0.75..=1.25.

use civic_common::config::RetryConfig;
use civic_common::Result;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Nominal delay before retry `retry` (1-based), without jitter
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Jittered delay before retry `retry`
    pub fn delay<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let jitter: f64 = rng.gen_range(0.75..=1.25);
        self.nominal_delay(retry).mul_f64(jitter)
    }
}

/// Run `operation`, retrying `TransientStorage` failures per `policy`
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Storage operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt <= policy.max_retries => {
                let delay = policy.delay(attempt, &mut rand::thread_rng());
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Transient storage failure, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Storage operation failed: retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
