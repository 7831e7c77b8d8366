use async_trait::async_trait;
use receptor_core::{InfraError, TokenProvider};

/// Always hands back a synthetic bearer token; never expires, never fails —
/// the real cache/refresh behavior lives in `receptor-resilience`'s
/// `CachedTokenProvider`, which wraps a `TokenProvider` fetched from the
/// actual OAuth2 collaborator.
#[derive(Default)]
pub struct InMemoryTokenProvider;

#[async_trait]
impl TokenProvider for InMemoryTokenProvider {
    async fn token(&self, organization_id: &str) -> Result<String, InfraError> {
        Ok(format!("test-token-{organization_id}"))
    }
}
