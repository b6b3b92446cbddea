//! Entry storage and freshness bookkeeping.
//!
//! This module provides [`CacheStore`], the keyed store behind the
//! coordinator. Entries live in an `IndexMap` kept in set order, so the front
//! of the map is always the least recently set entry (used for capacity
//! eviction).

use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::entry::{Entry, Freshness};
use crate::stats::{CacheStats, EntryStats, StatsSnapshot};

type Entries<V> = IndexMap<String, Entry<V>>;

struct Inner<V> {
    /// The actual storage, protected by a read-write lock.
    /// The lock is never held across an await point.
    entries: RwLock<Entries<V>>,

    /// Configuration for this cache instance.
    config: CacheConfig,

    /// Time source used to stamp and age entries.
    clock: Arc<dyn Clock>,

    /// Operation counters.
    stats: Arc<CacheStats>,
}

/// A keyed in-memory store that classifies entries as fresh, stale or expired.
///
/// Cloning a `CacheStore` creates a new handle to the same entries, so a
/// single store built at startup can be handed to every component that
/// needs it.
///
/// Expiry is lazy: an expired entry is removed the next time `get` sees it,
/// by [`cleanup_expired`](Self::cleanup_expired), or by the optional
/// background sweeper.
///
/// # Example
/// ```
/// use catalog_cache::{CacheConfig, CacheStore};
///
/// let store: CacheStore<String> = CacheStore::new(CacheConfig::default());
/// store.set("courses:list", "algebra, chemistry".to_string());
///
/// assert_eq!(store.get("courses:list").as_deref(), Some("algebra, chemistry"));
/// assert!(!store.is_stale("courses:list"));
/// ```
pub struct CacheStore<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> CacheStore<V> {
    /// Create a new store with the given configuration, aged by the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Create a new store that reads time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: impl Clock + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(IndexMap::new()),
                config,
                clock: Arc::new(clock),
                stats: Arc::new(CacheStats::new()),
            }),
        }
    }

    /// Returns `true` if the entry exists and is older than the stale threshold.
    ///
    /// Absent keys return `false`; call [`get`](Self::get) first to tell
    /// absent from stale. This never evicts or mutates anything.
    pub fn is_stale(&self, key: &str) -> bool {
        let now = self.inner.clock.now();
        let entries = match self.read_lock() {
            Some(e) => e,
            None => return false,
        };

        entries
            .get(key)
            .map(|entry| entry.is_stale_at(now, self.inner.config.stale_threshold))
            .unwrap_or(false)
    }

    /// Insert or replace the entry for `key`, stamped now and not stale.
    ///
    /// A replaced key moves to the most-recently-set position. A new key
    /// inserted at capacity first evicts the least recently set entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = Entry::new(value, self.inner.clock.now());

        let mut entries = match self.write_lock() {
            Some(e) => e,
            None => return, // Lock poisoned, silently fail
        };

        if let Some(max_capacity) = self.inner.config.max_capacity {
            // Replacing an existing key never evicts
            if !entries.contains_key(&key) {
                while entries.len() >= max_capacity {
                    self.evict_one(&mut entries);
                }
            }
        }

        let (idx, previous) = entries.insert_full(key, entry);
        if previous.is_some() {
            let last = entries.len() - 1;
            entries.move_index(idx, last);
        }
        self.inner.stats.record_set();
    }

    /// Delete a key from the store.
    ///
    /// Returns `true` if the key existed and was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut entries = match self.write_lock() {
            Some(e) => e,
            None => return false,
        };

        let existed = entries.shift_remove(key).is_some();
        if existed {
            self.inner.stats.record_delete();
        }
        existed
    }

    /// Remove all entries. Calling it on an empty store is a no-op.
    pub fn clear(&self) {
        if let Some(mut entries) = self.write_lock() {
            entries.clear();
        }
    }

    /// Count entries by their current freshness.
    ///
    /// Computed from each entry's age rather than its stale flag, so entries
    /// nobody has read recently are still classified correctly.
    pub fn stats(&self) -> EntryStats {
        let now = self.inner.clock.now();
        let entries = match self.read_lock() {
            Some(e) => e,
            None => return EntryStats::default(),
        };

        let total = entries.len();
        let stale = entries
            .values()
            .filter(|entry| entry.is_stale_at(now, self.inner.config.stale_threshold))
            .count();

        EntryStats {
            total,
            fresh: total - stale,
            stale,
        }
    }

    /// Classify the entry for `key` without touching it.
    pub fn freshness(&self, key: &str) -> Option<Freshness> {
        let now = self.inner.clock.now();
        let entries = self.read_lock()?;
        let config = &self.inner.config;

        entries
            .get(key)
            .map(|entry| entry.freshness_at(now, config.stale_threshold, config.ttl))
    }

    /// Check if a live (non-expired) entry exists for `key`.
    ///
    /// Unlike `get`, this does not evict an expired entry.
    pub fn contains(&self, key: &str) -> bool {
        !matches!(self.freshness(key), None | Some(Freshness::Expired))
    }

    /// Get the number of stored entries.
    ///
    /// Note: This may include expired entries that haven't been
    /// removed yet by lazy expiration or a sweep.
    pub fn len(&self) -> usize {
        match self.read_lock() {
            Some(entries) => entries.len(),
            None => 0,
        }
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let ttl = self.inner.config.ttl;
        let mut entries = match self.write_lock() {
            Some(e) => e,
            None => return 0,
        };

        let initial_len = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now, ttl));

        let removed = initial_len - entries.len();
        self.inner.stats.record_expirations(removed as u64);
        removed
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Get a snapshot of the operation counters.
    pub fn counters(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Get a reference to the internal statistics counter.
    ///
    /// This is useful for integrating with external metrics systems.
    pub fn stats_ref(&self) -> Arc<CacheStats> {
        Arc::clone(&self.inner.stats)
    }

    // Private helper methods

    /// Acquire a read lock, returning None if poisoned.
    fn read_lock(&self) -> Option<RwLockReadGuard<'_, Entries<V>>> {
        self.inner.entries.read().ok()
    }

    /// Acquire a write lock, returning None if poisoned.
    fn write_lock(&self) -> Option<RwLockWriteGuard<'_, Entries<V>>> {
        self.inner.entries.write().ok()
    }

    /// Evict the least recently set entry.
    fn evict_one(&self, entries: &mut Entries<V>) {
        if let Some((key, _)) = entries.shift_remove_index(0) {
            trace!(key = %key, "evicted least recently set entry");
            self.inner.stats.record_eviction();
        }
    }
}

impl<V: Clone> CacheStore<V> {
    /// Get a live value for `key`.
    ///
    /// Returns `None` if the key is absent or expired; an expired entry is
    /// evicted on the spot. A stale entry is still returned, and its sticky
    /// stale flag is set the first time this happens. Use
    /// [`is_stale`](Self::is_stale) to decide whether to revalidate.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.now();
        let config = &self.inner.config;
        let mut entries = self.write_lock()?;

        let freshness = match entries.get(key) {
            Some(entry) => entry.freshness_at(now, config.stale_threshold, config.ttl),
            None => {
                self.inner.stats.record_miss();
                return None;
            }
        };

        match freshness {
            Freshness::Expired => {
                entries.shift_remove(key);
                self.inner.stats.record_expiration();
                self.inner.stats.record_miss();
                None
            }
            Freshness::Stale => {
                let entry = entries.get_mut(key)?;
                if !entry.is_flagged_stale() {
                    entry.mark_stale();
                }
                self.inner.stats.record_stale_hit();
                Some(entry.value().clone())
            }
            Freshness::Fresh => {
                self.inner.stats.record_hit();
                entries.get(key).map(|entry| entry.value().clone())
            }
        }
    }

    /// Whether the stored entry for `key` has been flagged stale by a read.
    ///
    /// Mostly useful for tests and diagnostics; policy decisions use
    /// [`is_stale`](Self::is_stale), which is computed from age.
    pub fn is_flagged_stale(&self, key: &str) -> bool {
        self.read_lock()
            .and_then(|entries| entries.get(key).map(Entry::is_flagged_stale))
            .unwrap_or(false)
    }
}

impl<V: Send + Sync + 'static> CacheStore<V> {
    /// Start the background sweep of expired entries.
    ///
    /// Returns `None` when no sweep interval is configured. The task only
    /// holds a weak reference and exits once every handle to the store has
    /// been dropped. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.sweep_interval?;
        let weak = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = CacheStore { inner }.cleanup_expired();
                trace!(removed, "swept expired entries");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn store_with_clock() -> (CacheStore<&'static str>, ManualClock) {
        let clock = ManualClock::new();
        let store = CacheStore::with_clock(CacheConfig::default(), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_basic_set_get() {
        let (store, _) = store_with_clock();

        store.set("key1", "value1");

        assert_eq!(store.get("key1"), Some("value1"));
        assert!(!store.is_stale("key1"));
    }

    #[test]
    fn test_get_nonexistent() {
        let (store, _) = store_with_clock();

        assert!(store.get("nonexistent").is_none());
        assert!(!store.is_stale("nonexistent"));
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let (store, clock) = store_with_clock();

        store.set("key1", "value1");
        clock.advance(Duration::from_secs(200));
        let _ = store.get("key1");
        assert!(store.is_flagged_stale("key1"));

        store.set("key1", "value2");

        assert_eq!(store.get("key1"), Some("value2"));
        assert!(!store.is_stale("key1"));
        assert!(!store.is_flagged_stale("key1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stale_entry_is_still_returned() {
        let (store, clock) = store_with_clock();
        store.set("a", "1");

        clock.advance(Duration::from_secs(125));

        assert!(store.is_stale("a"));
        assert!(!store.is_flagged_stale("a"));
        assert_eq!(store.get("a"), Some("1"));
        assert!(store.is_flagged_stale("a"));
    }

    #[test]
    fn test_is_stale_has_no_side_effects() {
        let (store, clock) = store_with_clock();
        store.set("a", "1");

        clock.advance(Duration::from_secs(700));

        assert!(store.is_stale("a"));
        // Still stored: only get evicts
        assert_eq!(store.len(), 1);
        assert!(!store.is_flagged_stale("a"));
    }

    #[test]
    fn test_expired_entry_is_evicted_on_get() {
        let (store, clock) = store_with_clock();
        store.set("a", "1");

        clock.advance(Duration::from_secs(601));

        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_none());
        assert_eq!(store.len(), 0);
        assert_eq!(store.counters().expirations, 1);
    }

    #[test]
    fn test_delete() {
        let (store, _) = store_with_clock();

        store.set("key1", "value1");
        assert!(store.delete("key1"));
        assert!(store.get("key1").is_none());
        assert!(!store.delete("key1"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, _) = store_with_clock();

        store.set("key1", "value1");
        store.set("key2", "value2");
        store.clear();
        assert!(store.is_empty());

        store.clear();
        assert!(store.get("key1").is_none());
    }

    #[test]
    fn test_stats_by_age() {
        let (store, clock) = store_with_clock();

        store.set("old", "1");
        clock.advance(Duration::from_secs(150));
        store.set("new", "2");

        let stats = store.stats();
        assert_eq!(stats, EntryStats { total: 2, fresh: 1, stale: 1 });

        // Expired but unread entries still count until evicted
        clock.advance(Duration::from_secs(500));
        assert_eq!(store.stats(), EntryStats { total: 2, fresh: 0, stale: 2 });

        assert!(store.get("old").is_none());
        assert_eq!(store.stats(), EntryStats { total: 1, fresh: 0, stale: 1 });
    }

    #[test]
    fn test_freshness_and_contains() {
        let (store, clock) = store_with_clock();
        store.set("a", "1");

        assert_eq!(store.freshness("a"), Some(Freshness::Fresh));
        clock.advance(Duration::from_secs(121));
        assert_eq!(store.freshness("a"), Some(Freshness::Stale));
        assert!(store.contains("a"));
        clock.advance(Duration::from_secs(480));
        assert_eq!(store.freshness("a"), Some(Freshness::Expired));
        assert!(!store.contains("a"));
        assert_eq!(store.freshness("missing"), None);
    }

    #[test]
    fn test_capacity_eviction() {
        let config = CacheConfig::new().max_capacity(3).build().unwrap();
        let store = CacheStore::new(config);

        store.set("key1", "value1");
        store.set("key2", "value2");
        store.set("key3", "value3");
        assert_eq!(store.len(), 3);

        // This should evict key1 (least recently set)
        store.set("key4", "value4");
        assert_eq!(store.len(), 3);
        assert!(!store.contains("key1"));
        assert!(store.contains("key4"));
        assert_eq!(store.counters().evictions, 1);
    }

    #[test]
    fn test_reset_moves_key_to_back() {
        let config = CacheConfig::new().max_capacity(3).build().unwrap();
        let store = CacheStore::new(config);

        store.set("key1", "value1");
        store.set("key2", "value2");
        store.set("key3", "value3");

        // Re-setting key1 makes key2 the oldest; reads do not count
        store.set("key1", "again");
        let _ = store.get("key2");
        store.set("key4", "value4");

        assert!(store.contains("key1"));
        assert!(!store.contains("key2"));
        assert!(store.contains("key3"));
        assert!(store.contains("key4"));
    }

    #[test]
    fn test_cleanup_expired() {
        let (store, clock) = store_with_clock();

        store.set("old", "1");
        clock.advance(Duration::from_secs(500));
        store.set("new", "2");
        clock.advance(Duration::from_secs(200));

        assert_eq!(store.cleanup_expired(), 1);
        assert!(!store.contains("old"));
        assert!(store.contains("new"));
        assert_eq!(store.cleanup_expired(), 0);
    }

    #[test]
    fn test_counters_tracking() {
        let (store, clock) = store_with_clock();

        store.set("key1", "value1");
        let _ = store.get("key1"); // Hit
        let _ = store.get("nonexistent"); // Miss
        clock.advance(Duration::from_secs(130));
        let _ = store.get("key1"); // Stale hit

        let counters = store.counters();
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.stale_hits, 1);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.sets, 1);
    }

    #[test]
    fn test_invalid_thresholds_never_reach_a_store() {
        use crate::error::CacheError;

        let result = CacheConfig::new()
            .ttl(Duration::from_secs(60))
            .stale_threshold(Duration::from_secs(120))
            .build()
            .map(|config| CacheStore::<u32>::with_clock(config, ManualClock::new()));

        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_expired_entry_passes_through_stale() {
        let clock = ManualClock::new();
        let config = CacheConfig::new()
            .ttl(Duration::from_secs(60))
            .stale_threshold(Duration::from_secs(30))
            .build()
            .unwrap();
        let store = CacheStore::with_clock(config, clock.clone());
        store.set("k", 1);

        clock.advance(Duration::from_secs(45));
        assert_eq!(store.freshness("k"), Some(Freshness::Stale));
        assert!(store.is_stale("k"));

        clock.advance(Duration::from_secs(45));
        assert_eq!(store.freshness("k"), Some(Freshness::Expired));
        assert!(store.is_stale("k"));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_clones_share_entries() {
        let (store, _) = store_with_clock();
        let other = store.clone();

        other.set("key", "value");
        assert_eq!(store.get("key"), Some("value"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let clock = ManualClock::new();
        let config = CacheConfig::new()
            .sweep_interval(Duration::from_secs(1))
            .build()
            .unwrap();
        let store = CacheStore::with_clock(config, clock.clone());
        let handle = store.spawn_sweeper().expect("sweep interval configured");

        store.set("a", "1");
        clock.advance(Duration::from_secs(601));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(store.is_empty());

        drop(store);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should stop once the store is dropped")
            .unwrap();
    }

    #[test]
    fn test_no_sweeper_without_interval() {
        let store: CacheStore<u8> = CacheStore::default();
        assert!(store.spawn_sweeper().is_none());
    }
}
