//! Event Publisher (H), Idempotency Store (I), and Cache-Write Coordinator
//! (J) — spec.md §4.H, §4.I, §4.J.
//!
//! These three components share a crate because all three are pure
//! reactions to state already committed elsewhere: H republishes it, I
//! deduplicates writes that produced it, J invalidates cached reads of it.
//! None of them owns the aggregate they react to.

mod cache_coordinator;
mod idempotency;
mod publisher;

pub use cache_coordinator::{CacheInvalidationHandler, CacheKind, CacheWriteCoordinator};
pub use idempotency::{IdempotencyStore, DEFAULT_TTL};
pub use publisher::EventPublisher;
