//! Helpers for building deterministic cache keys.
//!
//! The store treats keys as opaque strings. Callers are responsible for
//! encoding every parameter that influences a result into the key, e.g.
//! `teachers:list:<subject>:<price_range>:<sort_by>:<query>`. [`CacheKey`]
//! does that joining in one place so two call sites cannot disagree on the
//! layout.

use std::fmt;

use crate::error::{CacheError, CacheResult};

/// Segment separator.
pub const SEPARATOR: char = ':';

/// Escape character for separators (and itself) inside a segment.
pub const ESCAPE: char = '\\';

/// A `:`-separated cache key built segment by segment.
///
/// Missing optional filters become empty segments so the number of
/// segments for a given key shape never changes:
///
/// ```
/// use catalog_cache::CacheKey;
///
/// let key = CacheKey::new("teachers")
///     .push("list")
///     .push("math")
///     .push_opt(None::<&str>)
///     .push("rating");
///
/// assert_eq!(key.as_str(), "teachers:list:math::rating");
/// ```
///
/// Separators inside a segment are escaped, so free-text filters cannot
/// shift segment boundaries:
///
/// ```
/// use catalog_cache::CacheKey;
///
/// let key = CacheKey::new("teachers").push("search").push("c++: intro");
/// assert_eq!(key.as_str(), r"teachers:search:c++\: intro");
/// assert_eq!(key.segments(), vec!["teachers", "search", "c++: intro"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    /// Start a key in the given namespace.
    pub fn new(namespace: impl AsRef<str>) -> Self {
        let mut key = String::new();
        escape_into(&mut key, namespace.as_ref());
        Self { key }
    }

    /// Start a key, rejecting an empty namespace.
    pub fn try_new(namespace: impl AsRef<str>) -> CacheResult<Self> {
        let namespace = namespace.as_ref();
        if namespace.trim().is_empty() {
            return Err(CacheError::InvalidKey("empty namespace".to_string()));
        }
        Ok(Self::new(namespace))
    }

    /// Append a segment, escaping any separator it contains.
    pub fn push(mut self, segment: impl fmt::Display) -> Self {
        self.key.push(SEPARATOR);
        escape_into(&mut self.key, &segment.to_string());
        self
    }

    /// Append an optional segment; `None` becomes an empty segment.
    pub fn push_opt<S: fmt::Display>(self, segment: Option<S>) -> Self {
        match segment {
            Some(segment) => self.push(segment),
            None => self.push(""),
        }
    }

    /// The key as a string slice, ready to hand to the store.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The namespace (first segment), unescaped.
    pub fn namespace(&self) -> String {
        self.segments().into_iter().next().unwrap_or_default()
    }

    /// Split the key back into its unescaped segments, namespace first.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = self.key.chars();

        while let Some(c) = chars.next() {
            match c {
                ESCAPE => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                SEPARATOR => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);
        segments
    }
}

/// Append `segment` to `key`, escaping separators and escape characters.
fn escape_into(key: &mut String, segment: &str) {
    for c in segment.chars() {
        if c == SEPARATOR || c == ESCAPE {
            key.push(ESCAPE);
        }
        key.push(c);
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
