//! Statistics and metrics for the cache.
//!
//! Two views are provided:
//! - [`EntryStats`]: a point-in-time count of entries by freshness, computed
//!   from each entry's age.
//! - [`CacheStats`]: atomic operation counters, snapshotted into
//!   [`StatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Count of stored entries by their current freshness.
///
/// `total` includes expired entries that nobody has read yet; those are
/// counted as `stale`. `fresh + stale == total` always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
}

/// Operation counters for a cache.
///
/// All counters are atomic and can be safely accessed from multiple threads.
/// Use `CacheStore::counters()` to get a snapshot.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads that found a fresh entry.
    hits: AtomicU64,

    /// Reads that found a stale (but live) entry.
    stale_hits: AtomicU64,

    /// Reads that found nothing, or an expired entry.
    misses: AtomicU64,

    /// Entries evicted due to the capacity limit.
    evictions: AtomicU64,

    /// Entries removed because they outlived the TTL.
    expirations: AtomicU64,

    /// Total number of set operations performed.
    sets: AtomicU64,

    /// Deletes that removed an entry.
    deletes: AtomicU64,

    /// Background refreshes started for stale entries.
    revalidations: AtomicU64,

    /// Background refreshes whose fetcher failed.
    revalidation_failures: AtomicU64,

    /// Fetches that joined an in-flight call instead of starting one.
    deduplicated: AtomicU64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record several expirations at once (sweeps).
    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revalidation(&self) {
        self.revalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revalidation_failure(&self) {
        self.revalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    // Getters for reading statistics

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn stale_hits(&self) -> u64 {
        self.stale_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn revalidations(&self) -> u64 {
        self.revalidations.load(Ordering::Relaxed)
    }

    pub fn revalidation_failures(&self) -> u64 {
        self.revalidation_failures.load(Ordering::Relaxed)
    }

    pub fn deduplicated(&self) -> u64 {
        self.deduplicated.load(Ordering::Relaxed)
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    ///
    /// Stale hits count as hits: the caller got data without waiting.
    /// Returns 0.0 if no reads have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() + self.stale_hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            stale_hits: self.stale_hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            sets: self.sets(),
            deletes: self.deletes(),
            revalidations: self.revalidations(),
            revalidation_failures: self.revalidation_failures(),
            deduplicated: self.deduplicated(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time snapshot of the operation counters.
///
/// Unlike `CacheStats`, this struct contains plain values (not atomics)
/// and can be easily printed or logged.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub sets: u64,
    pub deletes: u64,
    pub revalidations: u64,
    pub revalidation_failures: u64,
    pub deduplicated: u64,
    pub hit_rate: f64,
}
