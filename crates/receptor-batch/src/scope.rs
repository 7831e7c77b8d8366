use futures::future::select_all;
use tracing::warn;

/// How a structured-scope subtask can end besides succeeding.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError<E> {
    #[error("subtask failed: {0}")]
    Failed(E),
    #[error("subtask was cancelled")]
    Cancelled,
    #[error("subtask panicked")]
    Panicked,
}

/// Fork N subtasks, join them, and tie their fate together: if any fails,
/// the rest are cancelled and the first failure is surfaced (spec.md §4.F,
/// GLOSSARY "Structured scope"). Used for all-or-nothing compositions like
/// the fetch-account / fetch-balance / fetch-limits trio over one Consent
/// (spec.md §4.G step 3).
///
/// Each subtask runs as its own `tokio` task so a failure can actually
/// cancel its siblings (`JoinHandle::abort`), not merely stop being polled.
pub async fn run_scope<F, Fut, T, E>(tasks: Vec<F>) -> Result<Vec<T>, ScopeError<E>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let n = tasks.len();
    let mut abort_handles = Vec::with_capacity(n);
    let mut futs = Vec::with_capacity(n);

    for (index, task) in tasks.into_iter().enumerate() {
        let handle = tokio::spawn(task());
        abort_handles.push(handle.abort_handle());
        futs.push(Box::pin(async move {
            match handle.await {
                Ok(Ok(value)) => (index, Ok(value)),
                Ok(Err(e)) => (index, Err(ScopeError::Failed(e))),
                Err(join_err) if join_err.is_cancelled() => (index, Err(ScopeError::Cancelled)),
                Err(_) => (index, Err(ScopeError::Panicked)),
            }
        }));
    }

    let mut results: Vec<Option<T>> = (0..n).map(|_| None).collect();
    let mut remaining = futs;

    while !remaining.is_empty() {
        let ((index, outcome), _, rest) = select_all(remaining).await;
        remaining = rest;
        match outcome {
            Ok(value) => results[index] = Some(value),
            Err(e) => {
                warn!(index, "structured scope subtask failed, cancelling siblings");
                for handle in &abort_handles {
                    handle.abort();
                }
                return Err(e);
            }
        }
    }

    Ok(results.into_iter().map(|v| v.expect("every index filled before join completes")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn all_succeed_returns_every_value_in_order() {
        let tasks: Vec<_> = (0..3)
            .map(|i| {
                move || async move {
                    tokio::time::sleep(Duration::from_millis(5 * (3 - i))).await;
                    Ok::<_, String>(i)
                }
            })
            .collect();

        let result = run_scope(tasks).await.unwrap();
        assert_eq!(result, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn one_failure_cancels_siblings() {
        let sibling_completed = Arc::new(AtomicBool::new(false));
        let sibling_flag = sibling_completed.clone();

        let tasks: Vec<Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32, String>> + Send>> + Send>> = vec![
            Box::new(|| {
                Box::pin(async move { Err::<u32, _>("boom".to_string()) })
            }),
            Box::new(move || {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    sibling_flag.store(true, Ordering::SeqCst);
                    Ok::<u32, String>(1)
                })
            }),
        ];

        let result = run_scope(tasks).await;
        assert!(matches!(result, Err(ScopeError::Failed(_))));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!sibling_completed.load(Ordering::SeqCst));
    }
}
