//! # Catalog Cache
//!
//! An in-memory read-through cache with stale-while-revalidate (SWR)
//! semantics, built for catalog-style data that changes rarely but is read
//! constantly.
//!
//! ## Features
//!
//! - **Three-state entries**: fresh, stale, or expired, judged by age against
//!   a stale threshold and a TTL
//! - **SWR reads**: stale data is returned at once while a background task
//!   refreshes it
//! - **Single-flight**: concurrent fetches for one key share a single call
//! - **Injectable**: no globals; build a store, hand clones to whoever needs it
//! - **Statistics**: entry counts by freshness plus operation counters
//!
//! ## Quick Start
//!
//! ```rust
//! use catalog_cache::{CacheConfig, CacheCoordinator, CacheKey, CacheStore};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::new()
//!     .ttl(Duration::from_secs(600))
//!     .stale_threshold(Duration::from_secs(120))
//!     .build()?;
//!
//! let teachers: CacheCoordinator<Vec<String>, String> =
//!     CacheCoordinator::new(CacheStore::new(config));
//!
//! let key = CacheKey::new("teachers").push("list").push("math");
//! let list = teachers
//!     .fetch_with_cache(key.as_str(), || async {
//!         Ok(vec!["Ada".to_string(), "Emmy".to_string()])
//!     })
//!     .await?;
//!
//! assert_eq!(list.len(), 2);
//! assert_eq!(teachers.store().stats().fresh, 1);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod key;
pub mod stats;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use coordinator::CacheCoordinator;
pub use entry::Freshness;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use stats::{CacheStats, EntryStats, StatsSnapshot};
pub use storage::CacheStore;

// Internal modules - not part of public API
pub(crate) mod flight;

pub mod cli;
pub use cli::{Cli, DemoCommand, SimulateArgs};
