//! Cache entry with the metadata needed for freshness classification.

use std::time::{Duration, Instant};

/// Where an entry sits on its lifecycle, judged purely by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `age <= stale_threshold`: served without revalidation.
    Fresh,
    /// `stale_threshold < age <= ttl`: served, but revalidated in the background.
    Stale,
    /// `age > ttl`: no longer served; evicted on next read.
    Expired,
}

impl Freshness {
    /// Classify an age against the two thresholds.
    pub fn classify(age: Duration, stale_threshold: Duration, ttl: Duration) -> Self {
        if age > ttl {
            Freshness::Expired
        } else if age > stale_threshold {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Get the string representation of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Expired => "expired",
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single cache entry containing the value and metadata.
///
/// `stored_at` is written once, when the entry is created by a `set`.
/// `is_stale` is sticky: it is flipped to `true` by the first read that
/// observes the entry past the stale threshold and only a new `set`
/// (which builds a new entry) brings it back to `false`.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The stored value.
    pub(crate) value: V,

    /// When this entry was stored.
    pub(crate) stored_at: Instant,

    /// Whether a read has already seen this entry as stale.
    pub(crate) is_stale: bool,
}

impl<V> Entry<V> {
    /// Create a fresh entry stored at `now`.
    pub fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            stored_at: now,
            is_stale: false,
        }
    }

    /// How long ago the entry was stored. Saturates at zero.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Classify this entry at a given time.
    pub fn freshness_at(&self, now: Instant, stale_threshold: Duration, ttl: Duration) -> Freshness {
        Freshness::classify(self.age_at(now), stale_threshold, ttl)
    }

    /// Check if this entry has expired at a given time.
    pub fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        self.age_at(now) > ttl
    }

    /// Check if this entry is past the stale threshold at a given time.
    pub fn is_stale_at(&self, now: Instant, stale_threshold: Duration) -> bool {
        self.age_at(now) > stale_threshold
    }

    /// Set the sticky stale flag.
    pub fn mark_stale(&mut self) {
        self.is_stale = true;
    }

    /// Get a reference to the value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Get the time this entry was stored.
    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    /// Whether a read has flagged this entry stale.
    pub fn is_flagged_stale(&self) -> bool {
        self.is_stale
    }
}
