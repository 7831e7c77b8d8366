use std::time::Duration;

use receptor_core::InfraError;
use tracing::warn;

/// Up to 3 attempts, base 2s, multiplier 2.0 (spec.md §4.C). Only
/// idempotent verbs are eligible, and only network/5xx/timeout failures —
/// never 4xx except 408/429, which `InfraError::is_retryable` already
/// encodes via `RateLimited`/`TransientServerError`/`Timeout`.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base: Duration::from_secs(2), multiplier: 2.0 }
    }
}

impl RetryPolicy {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(self.base.as_secs_f64() * factor)
    }

    /// Runs `operation` (an idempotent verb — callers must never pass this a
    /// write) under this policy, retrying only on `is_retryable` failures.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, InfraError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, InfraError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff_for_attempt(attempt);
                    warn!(attempt, ?delay, %err, "retrying transmitter call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            multiplier: 1.0,
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(InfraError::TransientServerError(503)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_non_retryable_errors() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(InfraError::Forbidden) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
