//! Stale-while-revalidate read policy.
//!
//! This module provides [`CacheCoordinator`], which wraps an async fetcher
//! with [`CacheStore`] lookups:
//!
//! - fresh hit: return the cached value, no fetch
//! - stale hit: return the cached value now, refresh on a background task
//! - miss: await the fetcher, cache the value, hand errors back unchanged

use futures::future::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::flight::{FlightRegistry, SharedFetch};
use crate::storage::CacheStore;

/// Read-through cache front end with stale-while-revalidate semantics.
///
/// `V` is the cached value type, `E` the fetcher's error type. Errors are
/// returned to callers as-is; because one fetch result may be delivered to
/// several joined callers, `E` must be `Clone` (wrap it in `Arc` if it
/// isn't).
///
/// Cloning a coordinator creates a new handle to the same store and the
/// same set of in-flight fetches.
///
/// # Example
/// ```
/// use catalog_cache::{CacheConfig, CacheCoordinator, CacheStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = CacheStore::new(CacheConfig::default());
/// let catalog: CacheCoordinator<Vec<String>, String> = CacheCoordinator::new(store);
///
/// let courses = catalog
///     .fetch_with_cache("courses:list", || async {
///         Ok(vec!["Algebra".to_string(), "Chemistry".to_string()])
///     })
///     .await
///     .unwrap();
/// assert_eq!(courses.len(), 2);
///
/// // Served from cache: this fetcher is never called
/// let again = catalog
///     .fetch_with_cache("courses:list", || async { Err("offline".to_string()) })
///     .await;
/// assert_eq!(again, Ok(courses));
/// # }
/// ```
pub struct CacheCoordinator<V, E> {
    store: CacheStore<V>,
    flights: Arc<FlightRegistry<V, E>>,
}

impl<V, E> Clone for CacheCoordinator<V, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<V, E> fmt::Debug for CacheCoordinator<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("store", &self.store)
            .field("flights", &self.flights)
            .finish()
    }
}

impl<V, E> CacheCoordinator<V, E> {
    /// Wrap a store. Deduplication follows the store's configuration.
    pub fn new(store: CacheStore<V>) -> Self {
        Self {
            store,
            flights: Arc::new(FlightRegistry::new()),
        }
    }

    /// The underlying store, for warming, invalidation and stats.
    pub fn store(&self) -> &CacheStore<V> {
        &self.store
    }

    /// Number of keys with a deduplicated fetch currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn dedupe(&self) -> bool {
        self.store.config().dedupe_in_flight
    }
}

impl<V, E> CacheCoordinator<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    /// Read `key` through the cache, calling `fetcher` only when needed.
    ///
    /// Fresh data is returned without calling `fetcher`. Stale data is
    /// returned immediately while `fetcher` refreshes the entry on a
    /// background task; a failed refresh is logged and the stale entry kept.
    /// On a miss the caller waits for `fetcher`; its value is cached and its
    /// error returned unchanged (failures are never cached).
    ///
    /// Must be called from within a tokio runtime.
    pub async fn fetch_with_cache<F, Fut>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.store.get(key) {
            if !self.store.is_stale(key) {
                debug!(key, "cache hit");
                return Ok(value);
            }

            debug!(key, "stale hit, revalidating in background");
            self.revalidate(key, fetcher);
            return Ok(value);
        }

        debug!(key, "cache miss");
        self.fetch_and_store(key, fetcher).await
    }

    /// Miss path: the caller waits for the value.
    async fn fetch_and_store<F, Fut>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if !self.dedupe() {
            let result = fetcher().await;
            if let Ok(value) = &result {
                self.store.set(key, value.clone());
            }
            return result;
        }

        let (fetch, started) = self.flight(key, fetcher);
        if started {
            // Drive the fetch to completion even if this caller goes away
            let driver = fetch.clone();
            tokio::spawn(async move {
                let _ = driver.await;
            });
        } else {
            debug!(key, "joined in-flight fetch");
        }
        fetch.await
    }

    /// Stale path: refresh on a background task, never blocking the caller.
    fn revalidate<F, Fut>(&self, key: &str, fetcher: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let stats = self.store.stats_ref();
        let key = key.to_string();

        if self.dedupe() {
            let (fetch, started) = self.flight(&key, fetcher);
            if !started {
                debug!(key = %key, "refresh already in flight");
                return;
            }

            stats.record_revalidation();
            tokio::spawn(async move {
                if let Err(error) = fetch.await {
                    stats.record_revalidation_failure();
                    warn!(key = %key, error = %error, "background revalidation failed, keeping stale entry");
                }
            });
        } else {
            stats.record_revalidation();
            let store = self.store.clone();
            let refresh = fetcher();
            tokio::spawn(async move {
                match refresh.await {
                    Ok(value) => store.set(key, value),
                    Err(error) => {
                        stats.record_revalidation_failure();
                        warn!(key = %key, error = %error, "background revalidation failed, keeping stale entry");
                    }
                }
            });
        }
    }

    /// Join the running fetch for `key`, or start one.
    ///
    /// Returns the shared fetch and whether this call started it.
    fn flight<F, Fut>(&self, key: &str, fetcher: F) -> (SharedFetch<V, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let stats = self.store.stats_ref();

        if let Some(existing) = self.flights.get(key) {
            stats.record_deduplicated();
            return (existing, false);
        }

        let id = self.flights.next_id();
        let fetch = self.shared_fetch(key, id, fetcher());
        let (fetch, started) = self.flights.insert_or_join(key, id, fetch);
        if !started {
            stats.record_deduplicated();
        }
        (fetch, started)
    }

    /// Wrap a fetch so it stores its value and deregisters itself when done.
    fn shared_fetch<Fut>(&self, key: &str, id: u64, fetch: Fut) -> SharedFetch<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let store = self.store.clone();
        let flights = Arc::clone(&self.flights);
        let key = key.to_string();

        async move {
            let outcome = AssertUnwindSafe(fetch).catch_unwind().await;
            if let Ok(Ok(value)) = &outcome {
                store.set(key.clone(), value.clone());
            }
            // Deregister after storing so late callers see the new entry
            flights.finish(&key, id);

            match outcome {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn coordinator(dedupe: bool) -> (CacheCoordinator<u32, String>, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::new().dedupe_in_flight(dedupe).build().unwrap();
        let store = CacheStore::with_clock(config, clock.clone());
        (CacheCoordinator::new(store), clock)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches() {
        let (cache, _) = coordinator(true);

        let value = cache.fetch_with_cache("k", || async { Ok(1) }).await;
        assert_eq!(value, Ok(1));
        assert_eq!(cache.store().get("k"), Some(1));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetcher() {
        let (cache, _) = coordinator(true);
        cache.store().set("k", 1);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let value = cache
            .fetch_with_cache("k", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .await;

        assert_eq!(value, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_error_is_returned_and_not_cached() {
        let (cache, _) = coordinator(true);

        let value = cache
            .fetch_with_cache("k", || async { Err("boom".to_string()) })
            .await;
        assert_eq!(value, Err("boom".to_string()));
        assert!(cache.store().get("k").is_none());
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (cache, clock) = coordinator(true);
        cache.store().set("k", 1);
        clock.advance(Duration::from_secs(601));

        let value = cache.fetch_with_cache("k", || async { Ok(2) }).await;
        assert_eq!(value, Ok(2));
        assert!(!cache.store().is_stale("k"));
    }

    #[tokio::test]
    async fn test_stale_hit_refreshes_in_background() {
        for dedupe in [true, false] {
            let (cache, clock) = coordinator(dedupe);
            cache.store().set("k", 1);
            clock.advance(Duration::from_secs(130));

            let value = cache.fetch_with_cache("k", || async { Ok(2) }).await;
            assert_eq!(value, Ok(1));

            // Let the background task run
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(cache.store().get("k"), Some(2));
            assert!(!cache.store().is_stale("k"));
            assert_eq!(cache.store().counters().revalidations, 1);
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        for dedupe in [true, false] {
            let (cache, clock) = coordinator(dedupe);
            cache.store().set("k", 1);
            clock.advance(Duration::from_secs(130));

            let value = cache
                .fetch_with_cache("k", || async { Err("offline".to_string()) })
                .await;
            assert_eq!(value, Ok(1));

            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(cache.store().get("k"), Some(1));
            assert!(cache.store().is_stale("k"));
            assert_eq!(cache.store().counters().revalidation_failures, 1);
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let (cache, _) = coordinator(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<u32, String>(7)
            }
        };

        let (a, b, c) = tokio::join!(
            cache.fetch_with_cache("k", fetch(Arc::clone(&calls))),
            cache.fetch_with_cache("k", fetch(Arc::clone(&calls))),
            cache.fetch_with_cache("k", fetch(Arc::clone(&calls))),
        );

        assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.store().counters().deduplicated, 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_without_dedupe_each_fetch() {
        let (cache, _) = coordinator(false);
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>, value: u32| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 * value as u64)).await;
                Ok::<u32, String>(value)
            }
        };

        let (a, b) = tokio::join!(
            cache.fetch_with_cache("k", fetch(Arc::clone(&calls), 1)),
            cache.fetch_with_cache("k", fetch(Arc::clone(&calls), 2)),
        );

        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Last write wins
        assert_eq!(cache.store().get("k"), Some(2));
    }

    #[tokio::test]
    async fn test_joined_callers_share_the_error() {
        let (cache, _) = coordinator(true);

        let slow_failure = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u32, String>("unavailable".to_string())
        };

        let (a, b) = tokio::join!(
            cache.fetch_with_cache("k", slow_failure),
            cache.fetch_with_cache("k", slow_failure),
        );

        assert_eq!(a, Err("unavailable".to_string()));
        assert_eq!(b, Err("unavailable".to_string()));
        assert_eq!(cache.in_flight(), 0);
        assert!(cache.store().get("k").is_none());
    }
}
