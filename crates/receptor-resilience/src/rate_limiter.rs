use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter as GovernorLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};

use crate::error::ResilienceError;

/// Token-bucket over the gateway's entire outbound call volume: 1000 permits
/// per 60 s window, 5 s acquire timeout before surfacing `RateLimited`
/// (spec.md §4.C). Unkeyed, since this is a single shared budget rather than
/// a per-peer one.
pub struct RateLimiter {
    inner: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
    acquire_timeout: Duration,
}

impl RateLimiter {
    pub fn new(permits_per_window: u32, window: Duration, acquire_timeout: Duration) -> Self {
        let quota = Quota::with_period(window / permits_per_window.max(1))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()))
            .allow_burst(NonZeroU32::new(permits_per_window).unwrap_or(NonZeroU32::new(1).unwrap()));
        Self { inner: GovernorLimiter::direct(quota), acquire_timeout }
    }

    pub fn default_policy() -> Self {
        Self::new(1000, Duration::from_secs(60), Duration::from_secs(5))
    }

    pub async fn acquire(&self) -> Result<(), ResilienceError> {
        tokio::time::timeout(self.acquire_timeout, self.inner.until_ready())
            .await
            .map_err(|_| ResilienceError::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_within_burst() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.acquire().await.is_ok());
        }
    }
}
