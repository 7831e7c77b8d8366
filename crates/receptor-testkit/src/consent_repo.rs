use async_trait::async_trait;
use dashmap::DashMap;
use receptor_core::{Consent, ConsentRepository, DomainError};

/// Keyed by `consent_id`; `compare_and_swap` enforces optimistic concurrency
/// the same way a real row-versioned store would (spec.md §4.A).
#[derive(Default)]
pub struct InMemoryConsentRepository {
    consents: DashMap<String, Consent>,
}

#[async_trait]
impl ConsentRepository for InMemoryConsentRepository {
    async fn get(&self, consent_id: &str) -> Result<Option<Consent>, DomainError> {
        Ok(self.consents.get(consent_id).map(|c| c.value().clone()))
    }

    async fn compare_and_swap(
        &self,
        mut consent: Consent,
        expected_version: u64,
    ) -> Result<Consent, DomainError> {
        let mut slot = self
            .consents
            .get_mut(&consent.consent_id)
            .ok_or_else(|| DomainError::NotFound(consent.consent_id.clone()))?;

        if slot.version != expected_version {
            return Err(DomainError::ConcurrencyConflict);
        }

        consent.version = expected_version + 1;
        *slot = consent.clone();
        Ok(consent)
    }

    async fn insert(&self, consent: Consent) -> Result<Consent, DomainError> {
        self.consents.insert(consent.consent_id.clone(), consent.clone());
        Ok(consent)
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Consent>, DomainError> {
        Ok(self
            .consents
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use receptor_core::Permission;

    use super::*;

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_version() {
        let repo = InMemoryConsentRepository::default();
        let now = Utc::now();
        let consent = Consent::new(
            "c1".into(),
            "client".into(),
            "org".into(),
            "customer".into(),
            [Permission::AccountsRead].into_iter().collect::<BTreeSet<_>>(),
            now,
            None,
        );
        let saved = repo.insert(consent).await.unwrap();

        let mut stale = saved.clone();
        stale.status = receptor_core::ConsentStatus::Authorised;
        let ok = repo.compare_and_swap(stale.clone(), saved.version).await;
        assert!(ok.is_ok());

        let conflict = repo.compare_and_swap(stale, saved.version).await;
        assert_eq!(conflict.unwrap_err(), DomainError::ConcurrencyConflict);
    }
}
