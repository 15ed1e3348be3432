//! Generic TTL cache for the blockq engine
//!
//! One [`TtlCache`] instance is shared by unrelated callers (query results,
//! AI interpretations). Callers own key uniqueness, typically by prefixing
//! keys with a namespace such as `query-result:` or `ai-analysis:`.
//!
//! # Features
//!
//! - **Per-entry TTL**: every `set` carries its own time-to-live
//! - **Lazy expiry**: an expired entry is invisible to readers even before it
//!   is physically removed
//! - **Background sweep**: optional periodic reclamation of expired entries
//! - **LRU bound**: least recently used entries are evicted at capacity
//! - **Thread-safe**: reads and writes of one key are atomic with respect to
//!   each other
//! - **Statistics**: hits, misses, expirations, evictions
//!
//! There is no single-flight coalescing: two concurrent misses for the same
//! key both recompute, and the later `set` wins.
//!
//! # Example
//!
//! ```ignore
//! use blockq_cache::{CacheConfig, TtlCache};
//! use std::{sync::Arc, time::Duration};
//!
//! let cache = Arc::new(TtlCache::new(CacheConfig::default()));
//! cache.set("query-result:abc", payload, Duration::from_secs(30));
//! let hit = cache.get("query-result:abc");
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod stats;

pub use cache::{CacheError, SharedCache, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use stats::{CacheStats, CacheStatsSnapshot};
