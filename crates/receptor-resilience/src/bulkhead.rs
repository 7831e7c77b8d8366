use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ResilienceError;

/// Per-`(organizationId, apiFamily)` concurrency shard: max 100 concurrent
/// calls, 10 s acquire timeout (spec.md §4.C). Shards are created lazily and
/// never torn down — the number of distinct organizations is small and
/// bounded by the directory of participants.
pub struct Bulkhead {
    shards: DashMap<String, Arc<Semaphore>>,
    max_concurrent: usize,
    acquire_timeout: Duration,
}

impl Bulkhead {
    pub fn new(max_concurrent: usize, acquire_timeout: Duration) -> Self {
        Self { shards: DashMap::new(), max_concurrent, acquire_timeout }
    }

    pub fn default_policy() -> Self {
        Self::new(100, Duration::from_secs(10))
    }

    fn shard_key(organization_id: &str, api_family: &str) -> String {
        format!("{organization_id}:{api_family}")
    }

    fn shard(&self, organization_id: &str, api_family: &str) -> Arc<Semaphore> {
        self.shards
            .entry(Self::shard_key(organization_id, api_family))
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone()
    }

    pub async fn acquire(
        &self,
        organization_id: &str,
        api_family: &str,
    ) -> Result<OwnedSemaphorePermit, ResilienceError> {
        let semaphore = self.shard(organization_id, api_family);
        tokio::time::timeout(self.acquire_timeout, semaphore.acquire_owned())
            .await
            .map_err(|_| ResilienceError::BulkheadSaturated(Self::shard_key(organization_id, api_family)))?
            .map_err(|_| ResilienceError::BulkheadSaturated(Self::shard_key(organization_id, api_family)))
    }
}
