//! Consent lifecycle service: persistence, optimistic concurrency with a
//! single retry, and domain-event emission layered on top of the pure
//! [`crate::state_machine::transition`] (spec.md §4.A).

use std::sync::Arc;

use receptor_core::{Clock, Consent, ConsentRepository, DomainError, DomainEvent, EventBroker};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state_machine::{transition, ConsentEvent};

pub const CONSENT_EVENTS_TOPIC: &str = "consent-events";

pub struct ConsentService {
    repo: Arc<dyn ConsentRepository>,
    broker: Arc<dyn EventBroker>,
    clock: Arc<dyn Clock>,
}

impl ConsentService {
    pub fn new(
        repo: Arc<dyn ConsentRepository>,
        broker: Arc<dyn EventBroker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, broker, clock }
    }

    pub async fn create(&self, consent: Consent) -> Result<Consent, DomainError> {
        let saved = self.repo.insert(consent).await?;
        self.emit(&saved, DomainEvent::ConsentCreated {
            header: header(&saved.consent_id),
            consent_id: saved.consent_id.clone(),
        })
        .await;
        info!(consent_id = %saved.consent_id, "consent created");
        Ok(saved)
    }

    /// Apply one lifecycle event. On `ConcurrencyConflict` the caller's
    /// write is retried exactly once against a freshly re-read Consent
    /// before giving up (spec.md §4.A "the loser retries once then reports
    /// ConcurrencyConflict").
    pub async fn apply(
        &self,
        consent_id: &str,
        event: ConsentEvent,
    ) -> Result<Consent, DomainError> {
        for attempt in 0..2 {
            let consent = self
                .repo
                .get(consent_id)
                .await?
                .ok_or_else(|| DomainError::NotFound(consent_id.to_string()))?;

            let next_status = transition(consent.status, &event)?;

            let mut updated = consent.clone();
            updated.status = next_status;
            updated.status_updated_at = self.clock.now();
            if let Some(reason) = event.rejection_reason() {
                updated.rejection_reason = Some(reason);
            }

            match self
                .repo
                .compare_and_swap(updated, consent.version)
                .await
            {
                Ok(saved) => {
                    self.emit(&saved, domain_event_for(&saved, &event)).await;
                    return Ok(saved);
                }
                Err(DomainError::ConcurrencyConflict) if attempt == 0 => {
                    warn!(consent_id, "concurrency conflict, retrying once");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::ConcurrencyConflict)
    }

    async fn emit(&self, consent: &Consent, event: DomainEvent) {
        if let Err(e) = self.broker.publish(CONSENT_EVENTS_TOPIC, event).await {
            warn!(consent_id = %consent.consent_id, error = %e, "failed to publish consent event");
        }
    }
}

fn header(consent_id: &str) -> receptor_core::event::EventHeader {
    receptor_core::event::EventHeader::new(consent_id, Uuid::new_v4(), "receptor-consent")
}

fn domain_event_for(consent: &Consent, event: &ConsentEvent) -> DomainEvent {
    let h = header(&consent.consent_id);
    match event {
        ConsentEvent::Authorise => DomainEvent::ConsentAuthorised {
            header: h,
            consent_id: consent.consent_id.clone(),
        },
        ConsentEvent::Reject { reason } => DomainEvent::ConsentRejected {
            header: h,
            consent_id: consent.consent_id.clone(),
            reason: reason.clone(),
        },
        ConsentEvent::Consume => DomainEvent::ConsentConsumed {
            header: h,
            consent_id: consent.consent_id.clone(),
        },
        ConsentEvent::Revoke { reason } => DomainEvent::ConsentRevoked {
            header: h,
            consent_id: consent.consent_id.clone(),
            reason: reason.clone(),
        },
        ConsentEvent::Expire => DomainEvent::ConsentExpired {
            header: h,
            consent_id: consent.consent_id.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use receptor_core::{Consent, ConsentStatus, Permission};
    use receptor_testkit::{InMemoryConsentRepository, InMemoryEventBroker, TestClock};

    use super::*;

    fn new_consent() -> Consent {
        let now = Utc::now();
        Consent::new(
            "urn:consent:1".into(),
            "client-1".into(),
            "org-1".into(),
            "customer-1".into(),
            [Permission::AccountsRead, Permission::AccountsBalancesRead]
                .into_iter()
                .collect::<BTreeSet<_>>(),
            now,
            Some(now + chrono::Duration::days(180)),
        )
    }

    #[tokio::test]
    async fn s1_consent_happy_path() {
        let repo = Arc::new(InMemoryConsentRepository::default());
        let broker = Arc::new(InMemoryEventBroker::default());
        let clock = Arc::new(TestClock::default());
        let service = ConsentService::new(repo, broker.clone(), clock);

        let created = service.create(new_consent()).await.unwrap();
        assert_eq!(created.status, ConsentStatus::AwaitingAuthorisation);

        let authorised = service
            .apply(&created.consent_id, ConsentEvent::Authorise)
            .await
            .unwrap();
        assert_eq!(authorised.status, ConsentStatus::Authorised);

        let revoked = service
            .apply(&created.consent_id, ConsentEvent::Revoke { reason: None })
            .await
            .unwrap();
        assert_eq!(revoked.status, ConsentStatus::Revoked);

        let second_revoke = service
            .apply(&created.consent_id, ConsentEvent::Revoke { reason: None })
            .await;
        assert_eq!(second_revoke.unwrap_err(), DomainError::AlreadyRejected);

        let events = broker.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], DomainEvent::ConsentCreated { .. }));
        assert!(matches!(events[1], DomainEvent::ConsentAuthorised { .. }));
        assert!(matches!(events[2], DomainEvent::ConsentRevoked { .. }));
    }

    #[tokio::test]
    async fn s2_invalid_transition_leaves_consent_unchanged() {
        let repo = Arc::new(InMemoryConsentRepository::default());
        let broker = Arc::new(InMemoryEventBroker::default());
        let clock = Arc::new(TestClock::default());
        let service = ConsentService::new(repo.clone(), broker, clock);

        let created = service.create(new_consent()).await.unwrap();
        let err = service
            .apply(&created.consent_id, ConsentEvent::Consume)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStatusTransition { .. }));

        let unchanged = repo.get(&created.consent_id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ConsentStatus::AwaitingAuthorisation);
        assert_eq!(unchanged.version, created.version);
    }
}
