//! receptor-consent — Consent State Machine (spec.md §4.A).
//!
//! [`state_machine::transition`] is the pure function over
//! `(currentStatus, event) -> nextStatus | Error`; [`service::ConsentService`]
//! wraps it with persistence (optimistic concurrency + one retry),
//! timestamps, and domain-event emission.

pub mod service;
pub mod state_machine;

pub use service::ConsentService;
pub use state_machine::{transition, ConsentEvent};
