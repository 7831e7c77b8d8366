use async_trait::async_trait;
use dashmap::DashMap;
use receptor_core::{InfraError, ParticipantDirectory};

/// Maps `organizationId` to a base URL. Lookups against an organization that
/// was never [`register`](Self::register)ed fail with `InfraError::NotFound`,
/// the same outcome a real directory-of-participants client would report for
/// an unknown participant.
pub struct InMemoryParticipantDirectory {
    base_urls: DashMap<String, String>,
}

impl Default for InMemoryParticipantDirectory {
    fn default() -> Self {
        Self { base_urls: DashMap::new() }
    }
}

impl InMemoryParticipantDirectory {
    pub fn register(&self, organization_id: impl Into<String>, base_url: impl Into<String>) {
        self.base_urls.insert(organization_id.into(), base_url.into());
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryParticipantDirectory {
    async fn base_url(&self, organization_id: &str) -> Result<String, InfraError> {
        self.base_urls
            .get(organization_id)
            .map(|v| v.value().clone())
            .ok_or(InfraError::NotFound)
    }
}
