//! Configuration for the catalog cache.
//!
//! This module provides a builder for the two freshness thresholds plus the
//! optional capacity bound, sweep interval and in-flight deduplication switch.
//! A [`CacheConfig`] can only be obtained from [`CacheConfigBuilder::build`]
//! (or `Default`), so every store is built from a validated configuration.
//! Values are fixed once a store is constructed.

use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Default time-to-live: entries older than this are expired.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Default stale threshold: entries older than this are served but revalidated.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(2 * 60);

/// Validated configuration for a cache instance.
///
/// Use the builder pattern to construct configuration:
///
/// ```
/// use catalog_cache::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(300))
///     .stale_threshold(Duration::from_secs(60))
///     .max_capacity(10_000)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.get_ttl(), Duration::from_secs(300));
/// ```
///
/// Invalid thresholds never produce a config:
///
/// ```
/// use catalog_cache::CacheConfig;
/// use std::time::Duration;
///
/// let result = CacheConfig::new()
///     .ttl(Duration::from_secs(60))
///     .stale_threshold(Duration::from_secs(120))
///     .build();
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which an entry is expired and evicted on next read.
    pub(crate) ttl: Duration,

    /// Age after which an entry is stale and triggers revalidation.
    pub(crate) stale_threshold: Duration,

    /// Maximum number of entries the cache can hold.
    /// When this limit is reached, the least recently set entry is evicted.
    /// `None` means unlimited.
    pub(crate) max_capacity: Option<usize>,

    /// Interval for the background sweep of expired entries.
    /// `None` means lazy expiration only.
    pub(crate) sweep_interval: Option<Duration>,

    /// Whether concurrent fetches for the same key share one in-flight call.
    pub(crate) dedupe_in_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            max_capacity: None,
            sweep_interval: None,
            dedupe_in_flight: true,
        }
    }
}

impl CacheConfig {
    /// Start a configuration builder with default values.
    pub fn new() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Alias for [`CacheConfig::new`].
    pub fn builder() -> CacheConfigBuilder {
        Self::new()
    }

    /// Get the time-to-live.
    pub fn get_ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the stale threshold.
    pub fn get_stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    /// Get the maximum capacity, if set.
    pub fn get_max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Get the sweep interval, if set.
    pub fn get_sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval
    }

    /// Whether in-flight deduplication is enabled.
    pub fn get_dedupe_in_flight(&self) -> bool {
        self.dedupe_in_flight
    }
}

/// Builder for [`CacheConfig`].
///
/// Nothing built here reaches a store until [`build`](Self::build) has
/// checked it.
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the time-to-live. Must be strictly greater than the stale threshold.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Set the stale threshold.
    ///
    /// `Duration::ZERO` makes every entry stale as soon as any time has passed.
    pub fn stale_threshold(mut self, threshold: Duration) -> Self {
        self.config.stale_threshold = threshold;
        self
    }

    /// Set the maximum capacity of the cache.
    ///
    /// When the cache reaches this capacity, the least recently set
    /// entry will be evicted to make room for new keys.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries. Use 0 for unlimited.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.config.max_capacity = if capacity == 0 { None } else { Some(capacity) };
        self
    }

    /// Set the interval for background sweeping of expired entries.
    ///
    /// Only takes effect once [`CacheStore::spawn_sweeper`](crate::CacheStore::spawn_sweeper)
    /// is called. `Duration::ZERO` disables the sweep.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Enable or disable single-flight deduplication of fetches.
    pub fn dedupe_in_flight(mut self, enabled: bool) -> Self {
        self.config.dedupe_in_flight = enabled;
        self
    }

    /// Validate and return the final configuration.
    ///
    /// Fails with [`CacheError::InvalidConfig`] if `ttl` is zero or not
    /// strictly greater than `stale_threshold`.
    pub fn build(self) -> CacheResult<CacheConfig> {
        let config = self.config;
        if config.ttl.is_zero() {
            return Err(CacheError::InvalidConfig("ttl must be non-zero".to_string()));
        }
        if config.ttl <= config.stale_threshold {
            return Err(CacheError::InvalidConfig(format!(
                "ttl ({:?}) must exceed stale threshold ({:?})",
                config.ttl, config.stale_threshold
            )));
        }
        Ok(config)
    }
}
