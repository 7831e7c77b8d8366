//! In-memory adapters for every port trait in `receptor_core::ports`.
//!
//! These are test/demo doubles, not a persistence strategy — every concrete
//! storage engine, directory-of-participants lookup, token acquisition
//! endpoint, and message broker is an external collaborator per spec.md §1;
//! this crate exists only so the rest of the workspace has something to
//! construct a `ConsentService`/`JobQueue`/etc. against in tests and in the
//! `receptor-node` demo wiring.

mod account_repo;
mod broker;
mod clock;
mod consent_repo;
mod directory;
mod token_provider;
mod transaction_repo;
mod transmitter;

pub use account_repo::InMemoryAccountRepository;
pub use broker::{FailingEventBroker, InMemoryEventBroker};
pub use clock::TestClock;
pub use consent_repo::InMemoryConsentRepository;
pub use directory::InMemoryParticipantDirectory;
pub use token_provider::InMemoryTokenProvider;
pub use transaction_repo::InMemoryTransactionRepository;
pub use transmitter::FakeTransmitter;
