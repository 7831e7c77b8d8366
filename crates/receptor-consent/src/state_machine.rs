//! Pure transition function — spec.md §4.A. No I/O, no clock: every accepted
//! transition is computed here; the caller ([`crate::service::ConsentService`])
//! owns timestamps, persistence, and events.

use receptor_core::{ConsentStatus, DomainError, RejectionReason};

/// The lifecycle events a Consent may be driven by. Each names the target
/// state it requests; [`transition`] either grants it or rejects it per the
/// exhaustive table in spec.md §4.A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsentEvent {
    Authorise,
    Reject { reason: RejectionReason },
    Consume,
    Revoke { reason: Option<RejectionReason> },
    Expire,
}

impl ConsentEvent {
    fn requested_target(&self) -> ConsentStatus {
        match self {
            ConsentEvent::Authorise => ConsentStatus::Authorised,
            ConsentEvent::Reject { .. } => ConsentStatus::Rejected,
            ConsentEvent::Consume => ConsentStatus::Consumed,
            ConsentEvent::Revoke { .. } => ConsentStatus::Revoked,
            ConsentEvent::Expire => ConsentStatus::Expired,
        }
    }

    /// Reason attached to the Consent iff the target is REJECTED/REVOKED
    /// (spec.md §4.A rule 2).
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            ConsentEvent::Reject { reason } => Some(reason.clone()),
            ConsentEvent::Revoke { reason } => reason.clone(),
            _ => None,
        }
    }
}

/// The exhaustive transition table:
///
/// ```text
/// AWAITING_AUTHORISATION -> AUTHORISED | REJECTED
/// AUTHORISED             -> CONSUMED  | REVOKED | EXPIRED
/// CONSUMED               -> REVOKED
/// REJECTED | REVOKED | EXPIRED           (terminal)
/// ```
///
/// A revoke on a Consent already in a terminal revoked/rejected state is
/// special-cased to `AlreadyRejected` (stable code
/// `CONSENTIMENTO_EM_STATUS_REJEITADO`, §7) rather than the generic
/// `InvalidStatusTransition`, per scenario S1; a duplicate authorise on an
/// already-AUTHORISED Consent is likewise special-cased to
/// `AlreadyAuthorised`.
pub fn transition(
    current: ConsentStatus,
    event: &ConsentEvent,
) -> Result<ConsentStatus, DomainError> {
    use ConsentStatus::*;

    match (current, event) {
        (AwaitingAuthorisation, ConsentEvent::Authorise) => Ok(Authorised),
        (AwaitingAuthorisation, ConsentEvent::Reject { .. }) => Ok(Rejected),

        (Authorised, ConsentEvent::Authorise) => Err(DomainError::AlreadyAuthorised),
        (Authorised, ConsentEvent::Consume) => Ok(Consumed),
        (Authorised, ConsentEvent::Revoke { .. }) => Ok(Revoked),
        (Authorised, ConsentEvent::Expire) => Ok(Expired),

        (Consumed, ConsentEvent::Revoke { .. }) => Ok(Revoked),

        (Rejected, ConsentEvent::Revoke { .. }) => Err(DomainError::AlreadyRejected),
        (Revoked, ConsentEvent::Revoke { .. }) => Err(DomainError::AlreadyRejected),

        (from, event) => Err(DomainError::InvalidStatusTransition {
            from,
            to: event.requested_target(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all_statuses() -> Vec<ConsentStatus> {
        use ConsentStatus::*;
        vec![
            AwaitingAuthorisation,
            Authorised,
            Rejected,
            Consumed,
            Revoked,
            Expired,
        ]
    }

    fn all_events() -> Vec<ConsentEvent> {
        vec![
            ConsentEvent::Authorise,
            ConsentEvent::Reject {
                reason: RejectionReason {
                    code: "X".into(),
                    info: "x".into(),
                },
            },
            ConsentEvent::Consume,
            ConsentEvent::Revoke { reason: None },
            ConsentEvent::Expire,
        ]
    }

    #[test]
    fn s1_happy_path() {
        let mut status = ConsentStatus::AwaitingAuthorisation;
        status = transition(status, &ConsentEvent::Authorise).unwrap();
        assert_eq!(status, ConsentStatus::Authorised);
        status = transition(status, &ConsentEvent::Revoke { reason: None }).unwrap();
        assert_eq!(status, ConsentStatus::Revoked);
        let second_revoke = transition(status, &ConsentEvent::Revoke { reason: None });
        assert_eq!(second_revoke, Err(DomainError::AlreadyRejected));
    }

    #[test]
    fn s2_invalid_transition_leaves_status_computable_and_tagged() {
        let err = transition(ConsentStatus::AwaitingAuthorisation, &ConsentEvent::Consume)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                from: ConsentStatus::AwaitingAuthorisation,
                to: ConsentStatus::Consumed,
            }
        );
    }

    #[test]
    fn revoke_on_rejected_or_revoked_is_already_rejected_not_generic_invalid() {
        for status in [ConsentStatus::Rejected, ConsentStatus::Revoked] {
            let err = transition(status, &ConsentEvent::Revoke { reason: None }).unwrap_err();
            assert_eq!(err, DomainError::AlreadyRejected);
        }
    }

    #[test]
    fn terminal_statuses_reject_every_event() {
        for status in [ConsentStatus::Rejected, ConsentStatus::Revoked, ConsentStatus::Expired] {
            for event in all_events() {
                if matches!(
                    (status, &event),
                    (ConsentStatus::Rejected, ConsentEvent::Revoke { .. })
                        | (ConsentStatus::Revoked, ConsentEvent::Revoke { .. })
                ) {
                    continue; // covered by the AlreadyRejected special case above
                }
                assert!(transition(status, &event).is_err());
            }
        }
    }

    proptest! {
        /// Invariant 1 (spec.md §8): for every sequence of events drawn from
        /// the catalogue, the realized status always obeys the transition
        /// table — an accepted transition always matches one of the listed
        /// edges, and a rejected one never mutates status (by construction,
        /// since `transition` takes `current` by value and only a `Result`
        /// flows out).
        #[test]
        fn every_accepted_transition_is_in_the_table(
            status_idx in 0..6usize,
            event_idx in 0..5usize,
        ) {
            let status = all_statuses()[status_idx];
            let event = &all_events()[event_idx];
            if let Ok(next) = transition(status, event) {
                let allowed = matches!(
                    (status, next),
                    (ConsentStatus::AwaitingAuthorisation, ConsentStatus::Authorised)
                        | (ConsentStatus::AwaitingAuthorisation, ConsentStatus::Rejected)
                        | (ConsentStatus::Authorised, ConsentStatus::Consumed)
                        | (ConsentStatus::Authorised, ConsentStatus::Revoked)
                        | (ConsentStatus::Authorised, ConsentStatus::Expired)
                        | (ConsentStatus::Consumed, ConsentStatus::Revoked)
                );
                prop_assert!(allowed);
            }
        }
    }
}
