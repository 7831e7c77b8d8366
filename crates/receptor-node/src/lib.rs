//! Library surface behind the `receptor-node` binary, split out so that
//! crate-level integration tests under `tests/` can assemble a [`Pipeline`]
//! directly instead of spawning the process.

pub mod config;
pub mod pipeline;
