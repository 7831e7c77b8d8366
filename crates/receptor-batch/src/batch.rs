use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

/// Outcome of one item in a processed batch (spec.md §4.F).
#[derive(Debug)]
pub enum ItemOutcome<O, E> {
    Success(O),
    Failure(E),
    /// The whole-batch timeout elapsed before this item's turn came up, or
    /// while it was in flight.
    Cancelled,
}

/// `{successes, failures[], processingTimeMs}` (spec.md §4.F).
#[derive(Debug)]
pub struct BatchResult<O, E> {
    pub outcomes: Vec<ItemOutcome<O, E>>,
    pub processing_time: Duration,
}

impl<O, E> BatchResult<O, E> {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, ItemOutcome::Success(_))).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, ItemOutcome::Failure(_))).count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, ItemOutcome::Cancelled)).count()
    }
}

/// Default cap on whole-batch timeout regardless of the computed value
/// (spec.md §4.F).
pub const MAX_BATCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Runs `op` over `items` with bounded concurrency (the caller passes in the
/// Resource Manager's current `sync` permit count). Scheduling model:
/// cooperative fan-out — as many items in flight as `concurrency` allows; a
/// completed item immediately releases its slot. Input order is preserved
/// only in the returned index, never in execution order (spec.md §4.F).
///
/// Per-item failures never abort siblings — the batch always completes
/// (modulo the whole-batch timeout). Whole-batch timeout is
/// `perItemTimeout · ceil(items.len()/concurrency) + slack`, capped at
/// [`MAX_BATCH_TIMEOUT`]; in-flight or not-yet-started items at that point
/// are reported [`ItemOutcome::Cancelled`].
pub async fn run_batch<I, O, E, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    per_item_timeout: Duration,
    slack: Duration,
    op: F,
) -> BatchResult<O, E>
where
    F: Fn(I) -> Fut,
    Fut: std::future::Future<Output = Result<O, E>>,
{
    let started = Instant::now();
    let concurrency = concurrency.max(1);
    let batches = (items.len() as f64 / concurrency as f64).ceil() as u32;
    let whole_batch_timeout = (per_item_timeout * batches.max(1) + slack).min(MAX_BATCH_TIMEOUT);

    let total = items.len();
    let mut results: Vec<Option<ItemOutcome<O, E>>> = (0..total).map(|_| None).collect();

    let mut in_flight: FuturesUnordered<_> = FuturesUnordered::new();
    let mut pending = items.into_iter().enumerate();

    for (index, item) in pending.by_ref().take(concurrency) {
        in_flight.push(run_one(index, item, per_item_timeout, &op));
    }

    let deadline = tokio::time::sleep(whole_batch_timeout);
    tokio::pin!(deadline);

    loop {
        if in_flight.is_empty() {
            break;
        }
        tokio::select! {
            biased;
            _ = &mut deadline => {
                warn!(total, "batch timed out, cancelling remaining items");
                break;
            }
            Some((index, outcome)) = in_flight.next() => {
                results[index] = Some(outcome);
                if let Some((next_index, item)) = pending.next() {
                    in_flight.push(run_one(next_index, item, per_item_timeout, &op));
                }
            }
        }
    }

    let processing_time = started.elapsed();
    let outcomes = results
        .into_iter()
        .map(|o| o.unwrap_or(ItemOutcome::Cancelled))
        .collect();

    debug!(total, elapsed_ms = processing_time.as_millis() as u64, "batch finished");
    BatchResult { outcomes, processing_time }
}

async fn run_one<I, O, E, F, Fut>(index: usize, item: I, per_item_timeout: Duration, op: &F) -> (usize, ItemOutcome<O, E>)
where
    F: Fn(I) -> Fut,
    Fut: std::future::Future<Output = Result<O, E>>,
{
    match tokio::time::timeout(per_item_timeout, op(item)).await {
        Ok(Ok(value)) => (index, ItemOutcome::Success(value)),
        Ok(Err(e)) => (index, ItemOutcome::Failure(e)),
        Err(_) => (index, ItemOutcome::Cancelled),
    }
}
