//! Registry of in-flight fetches, one per key.
//!
//! Each running fetch is a [`Shared`] future so any number of callers can
//! await the same result. Entries are tagged with a generation id; a flight
//! only ever deregisters itself, never a newer flight for the same key.

use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A fetch that several callers can await.
pub(crate) type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Flight<V, E> {
    id: u64,
    fetch: SharedFetch<V, E>,
}

pub(crate) struct FlightRegistry<V, E> {
    flights: Mutex<HashMap<String, Flight<V, E>>>,
    next_id: AtomicU64,
}

impl<V, E> FlightRegistry<V, E> {
    pub(crate) fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Allocate a generation id for a flight about to be registered.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove the flight for `key` if it is still generation `id`.
    pub(crate) fn finish(&self, key: &str, id: u64) {
        if let Ok(mut flights) = self.flights.lock() {
            if flights.get(key).map(|f| f.id) == Some(id) {
                flights.remove(key);
            }
        }
    }

    /// Number of keys with a fetch currently running.
    pub(crate) fn len(&self) -> usize {
        self.flights.lock().map(|f| f.len()).unwrap_or(0)
    }
}

impl<V: Clone, E: Clone> FlightRegistry<V, E> {
    /// The running fetch for `key`, if any.
    pub(crate) fn get(&self, key: &str) -> Option<SharedFetch<V, E>> {
        let flights = self.flights.lock().ok()?;
        flights.get(key).map(|f| f.fetch.clone())
    }

    /// Register `fetch` as the flight for `key`, unless one appeared meanwhile.
    ///
    /// Returns the flight callers should await and whether it is the one
    /// passed in (`true`) or an existing one that was joined (`false`).
    pub(crate) fn insert_or_join(
        &self,
        key: &str,
        id: u64,
        fetch: SharedFetch<V, E>,
    ) -> (SharedFetch<V, E>, bool) {
        let mut flights = match self.flights.lock() {
            Ok(f) => f,
            // Poisoned: run unregistered rather than fail the caller
            Err(_) => return (fetch, true),
        };

        if let Some(existing) = flights.get(key) {
            return (existing.fetch.clone(), false);
        }

        flights.insert(
            key.to_string(),
            Flight {
                id,
                fetch: fetch.clone(),
            },
        );
        (fetch, true)
    }
}

impl<V, E> fmt::Debug for FlightRegistry<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightRegistry")
            .field("in_flight", &self.len())
            .finish()
    }
}
