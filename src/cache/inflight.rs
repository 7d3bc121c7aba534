//! In-flight request coalescing
//!
//! Concurrent callers asking for the same key attach to one shared future
//! instead of each starting the same build or render. The slot is cleared
//! as soon as the computation finishes, so failures are handed to the
//! callers already waiting and are never retained.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type Computation<V> = Shared<BoxFuture<'static, V>>;

/// Map from key to the pending computation for that key
pub struct InFlight<K, V>
where
    V: Clone,
{
    name: &'static str,
    pending: Arc<Mutex<HashMap<K, Computation<V>>>>,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `make` for `key`, or join the computation already running for it
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (computation, leader) = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some(existing) => {
                    debug!("[{}] Joining in-flight request: {}", self.name, key);
                    (existing.clone(), false)
                }
                None => {
                    let registry = Arc::clone(&self.pending);
                    let slot = key.clone();
                    let fut = make();
                    let computation = async move {
                        let value = fut.await;
                        registry
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&slot);
                        value
                    }
                    .boxed()
                    .shared();
                    pending.insert(key.clone(), computation.clone());
                    (computation, true)
                }
            }
        };

        if leader {
            debug!("[{}] Started request: {}", self.name, key);
        }

        computation.await
    }

    /// Number of keys with a computation still running
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Computation<V>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let inflight: InFlight<String, usize> = InFlight::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |calls: Arc<AtomicUsize>| {
            inflight.run("doc".to_string(), move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                calls.fetch_add(1, Ordering::SeqCst) + 1
            })
        };

        let (a, b, c) = tokio::join!(run(calls.clone()), run(calls.clone()), run(calls.clone()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((a, b, c), (1, 1, 1));
        assert_eq!(inflight.pending(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_retained() {
        let inflight: InFlight<String, Result<u32, String>> = InFlight::new("test");

        let first = inflight
            .run("key".to_string(), || async { Err("boom".to_string()) })
            .await;
        assert!(first.is_err());
        assert_eq!(inflight.pending(), 0);

        let second = inflight.run("key".to_string(), || async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let inflight: InFlight<String, usize> = InFlight::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                0
            }
        };

        tokio::join!(
            inflight.run("a".to_string(), make(calls.clone())),
            inflight.run("b".to_string(), make(calls.clone())),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
