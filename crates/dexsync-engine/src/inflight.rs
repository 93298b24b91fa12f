//! Keyed single-flight registry.
//!
//! The first caller for a key becomes the leader and its future is stored as a
//! shared future; callers arriving while it runs join it and receive a clone of
//! the same output. The entry removes itself when the future completes, so a
//! later request for the key starts a fresh fetch.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type Flight<V> = Shared<BoxFuture<'static, V>>;

/// Single-flight registry keyed by string
pub struct InflightRegistry<V: Clone> {
    flights: Arc<Mutex<HashMap<String, Flight<V>>>>,
}

impl<V> InflightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Empty registry
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `start()` for `key` unless a flight for it is already running, then
    /// await the shared result.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        self.join_or_start(key, start).await
    }

    fn join_or_start<F, Fut>(&self, key: &str, start: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut flights = self.flights.lock();
        if let Some(existing) = flights.get(key) {
            tracing::trace!(key = %key, "Joining in-flight request");
            return existing.clone();
        }

        let fetch = start();
        let registry = Arc::clone(&self.flights);
        let owned_key = key.to_string();
        let flight = async move {
            let output = fetch.await;
            registry.lock().remove(&owned_key);
            output
        }
        .boxed()
        .shared();

        flights.insert(key.to_string(), flight.clone());
        flight
    }

    /// Number of keys with a running flight
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    /// Whether a flight for `key` is running
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights.lock().contains_key(key)
    }
}

impl<V> Default for InflightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_shares_one_fetch() {
        let registry = Arc::new(InflightRegistry::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                registry
                    .run("0xtoken", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        7
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_run_in_parallel() {
        let registry = Arc::new(InflightRegistry::<&'static str>::new());
        let a = registry.run("a", || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "a"
        });
        let b = registry.run("b", || async { "b" });
        let (a, b) = tokio::join!(a, b);
        assert_eq!((a, b), ("a", "b"));
    }

    #[tokio::test]
    async fn test_completed_flight_is_not_reused() {
        let registry = InflightRegistry::<u32>::new();
        assert_eq!(registry.run("k", || async { 1 }).await, 1);
        assert!(!registry.is_in_flight("k"));
        assert_eq!(registry.run("k", || async { 2 }).await, 2);
    }
}
