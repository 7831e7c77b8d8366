use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use receptor_core::IdempotencyRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

/// TTL default (spec.md §4.I).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

enum State {
    InFlight(Arc<Notify>),
    Done(IdempotencyRecord),
}

enum LeaderDecision {
    BecomeLeader,
    AlreadyDone,
    AlreadyInFlight,
}

/// `begin(key, responseType)` single-flight: the first caller for a key
/// executes the thunk and caches its response under a TTL; concurrent
/// callers for the same key block on a per-key lease and observe the stored
/// response once it lands, rather than racing the thunk themselves (spec.md
/// §4.I, §8 property 3, scenario S6).
pub struct IdempotencyStore {
    entries: DashMap<String, State>,
    default_ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: DashMap::new(), default_ttl }
    }

    pub async fn begin<T, E, F, Fut>(&self, key: &str, response_type: &str, now: DateTime<Utc>, thunk: F) -> Result<T, E>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let notify = loop {
            if let Some(entry) = self.entries.get(key) {
                match &*entry {
                    State::Done(record) if !record.is_expired(now) => {
                        let value: T = serde_json::from_str(&record.serialized_response)
                            .expect("idempotency record deserializes into the type requested for its key");
                        return Ok(value);
                    }
                    State::InFlight(notify) => {
                        let notify = notify.clone();
                        drop(entry);
                        notify.notified().await;
                        continue;
                    }
                    State::Done(_) => {}
                }
            }

            let candidate_notify = Arc::new(Notify::new());
            let decision = match self.entries.entry(key.to_string()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(State::InFlight(candidate_notify.clone()));
                    LeaderDecision::BecomeLeader
                }
                Entry::Occupied(mut occupied) => {
                    let should_overwrite = matches!(occupied.get(), State::Done(record) if record.is_expired(now));
                    if should_overwrite {
                        occupied.insert(State::InFlight(candidate_notify.clone()));
                        LeaderDecision::BecomeLeader
                    } else if matches!(occupied.get(), State::InFlight(_)) {
                        LeaderDecision::AlreadyInFlight
                    } else {
                        LeaderDecision::AlreadyDone
                    }
                }
            };

            match decision {
                LeaderDecision::BecomeLeader => break candidate_notify,
                LeaderDecision::AlreadyInFlight | LeaderDecision::AlreadyDone => continue,
            }
        };

        debug!(key, "idempotency lease acquired, executing thunk");
        match thunk().await {
            Ok(value) => {
                let serialized = serde_json::to_string(&value)
                    .expect("idempotent response type must be JSON-serializable");
                let record = IdempotencyRecord {
                    key: key.to_string(),
                    serialized_response: serialized,
                    response_type: response_type.to_string(),
                    stored_at: now,
                    ttl_seconds: self.default_ttl.as_secs(),
                };
                self.entries.insert(key.to_string(), State::Done(record));
                notify.notify_waiters();
                Ok(value)
            }
            Err(e) => {
                self.entries.remove(key);
                notify.notify_waiters();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn s6_concurrent_callers_single_flight_the_thunk() {
        let store = Arc::new(IdempotencyStore::new(DEFAULT_TTL));
        let calls = Arc::new(AtomicU32::new(0));
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                store
                    .begin("interaction-1", "Consent", now, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok::<String, ()>("consent-xyz".to_string())
                        }
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == "consent-xyz"));
    }

    #[tokio::test]
    async fn expired_entry_runs_the_thunk_again() {
        let store = IdempotencyStore::new(Duration::from_secs(1));
        let t0 = Utc::now();
        let first = store.begin("k", "X", t0, || async { Ok::<u32, ()>(1) }).await.unwrap();
        assert_eq!(first, 1);

        let t1 = t0 + chrono::Duration::seconds(2);
        let second = store.begin("k", "X", t1, || async { Ok::<u32, ()>(2) }).await.unwrap();
        assert_eq!(second, 2);
    }
}
