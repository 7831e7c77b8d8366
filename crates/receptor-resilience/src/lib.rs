//! Resilience primitives composed outside-in by the Transmitter Gateway
//! (spec.md §4.C): Rate Limiter → Bulkhead → Circuit Breaker → Retry →
//! Token-Bound Request → Timeout.
//!
//! The circuit breaker and retry policy have no off-the-shelf analogue in
//! the teacher crate; both are grounded in the admission/backoff posture of
//! the Overpass enrichment worker (`other_examples` —
//! `leynos-wildside__backend-src-domain-overpass_enrichment_worker`), hand
//! rolled rather than composed from `tower::Service` middleware since this
//! system has no inbound HTTP server layer for `tower` to sit in front of.

mod bulkhead;
mod circuit_breaker;
mod error;
mod rate_limiter;
mod retry;
mod token_provider;

pub use bulkhead::Bulkhead;
pub use circuit_breaker::{Admission, CircuitBreaker};
pub use error::ResilienceError;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use token_provider::CachedTokenProvider;
