//! Parallel Batch Processor — component F (spec.md §4.F), plus the
//! `StructuredScope` primitive named in the GLOSSARY and used by the Sync
//! Orchestrator (component G) for all-or-nothing subtask groups.

mod batch;
mod scope;

pub use batch::{run_batch, BatchResult, ItemOutcome, MAX_BATCH_TIMEOUT};
pub use scope::{run_scope, ScopeError};
