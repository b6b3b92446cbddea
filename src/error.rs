//! Error types for the catalog cache.
//!
//! Store operations are total and never fail. The only fallible surface is
//! configuration and key construction. Errors produced by fetchers are handed
//! back to the caller untouched and never appear here.

use thiserror::Error;

/// The error type for cache construction and key building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The configuration violates an invariant (for example `ttl <= stale_threshold`).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The provided key is invalid (empty namespace, etc.).
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidConfig("ttl must exceed stale threshold".to_string());
        assert_eq!(
            format!("{}", err),
            "invalid config: ttl must exceed stale threshold"
        );

        let err = CacheError::InvalidKey("empty namespace".to_string());
        assert_eq!(format!("{}", err), "invalid key: empty namespace");
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_error(&CacheError::InvalidKey("x".to_string()));
    }
}
