use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use receptor_core::{InfraError, TokenProvider};

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Lazily fetches and caches a client-credentials token per
/// `organizationId`, refreshing before expiry with a minute of jitter
/// (spec.md §4.C). Wraps whatever `TokenProvider` actually talks to the
/// OAuth2 collaborator — this struct never calls out itself.
pub struct CachedTokenProvider {
    inner: Arc<dyn TokenProvider>,
    cache: DashMap<String, CachedToken>,
    /// Tokens are assumed valid for this long from the moment they're
    /// fetched; the upstream directory doesn't hand back an explicit TTL in
    /// this system, so a conservative fixed lifetime is used.
    assumed_ttl: Duration,
}

impl CachedTokenProvider {
    pub fn new(inner: Arc<dyn TokenProvider>) -> Self {
        Self { inner, cache: DashMap::new(), assumed_ttl: Duration::from_secs(3600) }
    }

    fn jittered_refresh_margin() -> chrono::Duration {
        let jitter_seconds = rand::thread_rng().gen_range(0..60);
        chrono::Duration::seconds(jitter_seconds)
    }
}

#[async_trait::async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn token(&self, organization_id: &str) -> Result<String, InfraError> {
        let now = Utc::now();
        if let Some(cached) = self.cache.get(organization_id) {
            if cached.expires_at - Self::jittered_refresh_margin() > now {
                return Ok(cached.token.clone());
            }
        }

        let token = self.inner.token(organization_id).await?;
        let expires_at = now + chrono::Duration::from_std(self.assumed_ttl).unwrap();
        self.cache.insert(organization_id.to_string(), CachedToken { token: token.clone(), expires_at });
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn token(&self, organization_id: &str) -> Result<String, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-for-{organization_id}"))
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_cached() {
        let inner = Arc::new(CountingProvider { calls: AtomicU32::new(0) });
        let cached = CachedTokenProvider::new(inner.clone());

        let t1 = cached.token("org-1").await.unwrap();
        let t2 = cached.token("org-1").await.unwrap();
        assert_eq!(t1, t2);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
