use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

/// The four materialized views spec.md §4.J names as subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKind {
    ConsentById,
    ConsentsByClient,
    AccountById,
    AccountsByClient,
}

#[async_trait]
pub trait CacheInvalidationHandler: Send + Sync {
    async fn evict(&self, key: &str);
}

/// Pure pub-sub of invalidation keys emitted by the Consent State Machine
/// (A) and the Sync Orchestrator (G). Invalidation is awaited by the
/// caller before it returns, so the next read on the same request path
/// never observes stale state (spec.md §4.J).
#[derive(Default)]
pub struct CacheWriteCoordinator {
    subscribers: DashMap<CacheKind, Vec<Arc<dyn CacheInvalidationHandler>>>,
}

impl CacheWriteCoordinator {
    pub fn subscribe(&self, kind: CacheKind, handler: Arc<dyn CacheInvalidationHandler>) {
        self.subscribers.entry(kind).or_insert_with(Vec::new).push(handler);
    }

    pub async fn invalidate(&self, kind: CacheKind, key: &str) {
        let handlers: Vec<_> = self.subscribers.get(&kind).map(|v| v.clone()).unwrap_or_default();
        for handler in handlers {
            handler.evict(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct CountingHandler {
        evictions: Arc<AtomicU32>,
    }

    #[async_trait]
    impl CacheInvalidationHandler for CountingHandler {
        async fn evict(&self, _key: &str) {
            self.evictions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn invalidate_notifies_every_subscriber_of_the_kind() {
        let coordinator = CacheWriteCoordinator::default();
        let evictions = Arc::new(AtomicU32::new(0));
        coordinator.subscribe(
            CacheKind::ConsentById,
            Arc::new(CountingHandler { evictions: evictions.clone() }),
        );
        coordinator.subscribe(
            CacheKind::ConsentById,
            Arc::new(CountingHandler { evictions: evictions.clone() }),
        );
        coordinator.subscribe(
            CacheKind::AccountById,
            Arc::new(CountingHandler { evictions: evictions.clone() }),
        );

        coordinator.invalidate(CacheKind::ConsentById, "c1").await;
        assert_eq!(evictions.load(Ordering::SeqCst), 2);
    }
}
