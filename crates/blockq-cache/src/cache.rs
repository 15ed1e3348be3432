//! TTL cache implementation

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::stats::CacheStats;
use lru::LruCache;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to deserialize value for key '{key}': {source}")]
    Deserialize {
        key: String,
        source: serde_json::Error,
    },
}

/// Entry owned by the cache. Callers only ever receive clones of `value`.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

type Entries<V> = LruCache<String, CacheEntry<V>>;

/// Removes every expired entry, returning how many were dropped.
fn purge_expired<V>(entries: &mut Entries<V>, now: Instant) -> usize {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, entry)| !entry.is_live(now))
        .map(|(key, _)| key.clone())
        .collect();

    for key in &expired {
        entries.pop(key);
    }
    expired.len()
}

/// Thread-safe key/value cache with per-entry expiry.
pub struct TtlCache<V> {
    entries: RwLock<Entries<V>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
    clock: Arc<dyn Clock>,
}

/// Instance shared across subsystems; values are serialized JSON snapshots so
/// each caller can store its own type without a common value enum.
pub type SharedCache = TtlCache<Arc<str>>;

impl<V: Clone> TtlCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            config,
            stats: Arc::new(CacheStats::new()),
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the value if present and not expired. Expired entries are
    /// removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();
        let mut entries = self.entries.write();

        let live = entries.get(key).map(|entry| entry.is_live(now));
        match live {
            Some(true) => {
                self.stats.record_hit();
                entries.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                entries.pop(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                self.stats.set_entry_count(entries.len() as u64);
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Unconditional upsert: replaces any existing value and its expiry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let key = key.into();
        let mut entries = self.entries.write();

        if ttl.is_zero() {
            // Would never be visible; still drop any previous value.
            entries.pop(&key);
            self.stats.set_entry_count(entries.len() as u64);
            return;
        }

        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(ttl),
        };

        // Expired entries go before the LRU bound may claim a live one.
        if entries.len() >= entries.cap().get() && !entries.contains(&key) {
            let purged = purge_expired(&mut entries, now);
            if purged > 0 {
                self.stats.record_expirations(purged as u64);
            }
        }

        if let Some((evicted_key, _)) = entries.push(key.clone(), entry) {
            if evicted_key != key {
                self.stats.record_eviction();
            }
        }

        self.stats.record_insert();
        self.stats.set_entry_count(entries.len() as u64);
    }

    /// `set` with the configured default TTL.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.config.default_ttl);
    }

    /// Removes the key. Removing an absent key is a no-op.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        let removed = entries.pop(key).is_some();
        if removed {
            self.stats.record_invalidation();
            self.stats.set_entry_count(entries.len() as u64);
        }
        removed
    }

    /// Removes every key in a namespace.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            entries.pop(key);
            self.stats.record_invalidation();
        }
        self.stats.set_entry_count(entries.len() as u64);
        keys.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.stats.set_entry_count(0);
    }

    /// Physically removes expired entries. Live entries are never touched.
    pub fn expire_stale(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let removed = purge_expired(&mut entries, now);

        self.stats.record_expirations(removed as u64);
        self.stats.set_entry_count(entries.len() as u64);
        removed
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Number of physically stored entries, which may include expired ones
    /// not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Starts the periodic sweeper if `sweep_interval` is configured. The task
    /// holds only a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.sweep_interval?;
        let cache = Arc::downgrade(self);

        info!(interval_secs = interval.as_secs_f64(), "Starting cache sweeper");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.expire_stale();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                }
            }
        }))
    }
}

impl SharedCache {
    /// Reads and deserializes a JSON snapshot.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key) {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::Deserialize {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Serializes `value` and stores the snapshot.
    pub fn set_json<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = key.into();
        let raw = serde_json::to_string(value).map_err(|source| CacheError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.set(key, Arc::from(raw), ttl);
        Ok(())
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("enabled", &self.config.enabled)
            .field("max_entries", &self.config.max_entries)
            .field("default_ttl", &self.config.default_ttl)
            .field("current_entries", &self.entries.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn manual_cache(config: CacheConfig) -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(config, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_set_then_get() {
        let (cache, _) = manual_cache(CacheConfig::default());
        cache.set("k", "v".to_string(), Duration::from_secs(10));
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_missing_key_is_absent() {
        let (cache, _) = manual_cache(CacheConfig::default());
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_expiry_is_lazy_and_exact() {
        let (cache, clock) = manual_cache(CacheConfig::default());
        cache.set("k", "v".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert!(cache.get("k").is_some());

        // Visible only while now < expires_at.
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().expirations(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_invisible_before_sweep() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_sweep_interval(None));
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_set_overwrites_value_and_expiry() {
        let (cache, clock) = manual_cache(CacheConfig::default());
        cache.set("k", "old".to_string(), Duration::from_secs(100));
        cache.set("k", "new".to_string(), Duration::from_secs(5));

        assert_eq!(cache.get("k"), Some("new".to_string()));
        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().evictions(), 0);
    }

    #[test]
    fn test_zero_ttl_removes_previous_value() {
        let (cache, _) = manual_cache(CacheConfig::default());
        cache.set("k", "v".to_string(), Duration::from_secs(5));
        cache.set("k", "w".to_string(), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let (cache, _) = manual_cache(CacheConfig::default());
        cache.put("k", "v".to_string());
        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert!(!cache.invalidate("never-set"));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_invalidate_prefix_keeps_other_namespaces() {
        let (cache, _) = manual_cache(CacheConfig::default());
        cache.put("query-result:1", "a".to_string());
        cache.put("query-result:2", "b".to_string());
        cache.put("ai-analysis:1", "c".to_string());

        assert_eq!(cache.invalidate_prefix("query-result:"), 2);
        assert_eq!(cache.get("ai-analysis:1"), Some("c".to_string()));
    }

    #[test]
    fn test_expire_stale_spares_live_entries() {
        let (cache, clock) = manual_cache(CacheConfig::default());
        cache.set("short", "a".to_string(), Duration::from_secs(1));
        cache.set("long", "b".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.expire_stale(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some("b".to_string()));
    }

    #[test]
    fn test_lru_eviction() {
        let (cache, _) = manual_cache(CacheConfig::default().with_max_entries(3));
        for i in 0..4 {
            cache.put(format!("k{}", i), i.to_string());
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_full_cache_drops_expired_before_live() {
        let (cache, clock) = manual_cache(CacheConfig::default().with_max_entries(2));
        cache.set("b", "short".to_string(), Duration::from_secs(10));
        cache.set("a", "long".to_string(), Duration::from_secs(60));
        // "a" is now least recently used, "b" most recently used.
        assert!(cache.get("b").is_some());

        clock.advance(Duration::from_secs(11));
        cache.set("c", "new".to_string(), Duration::from_secs(60));

        assert_eq!(cache.get("a"), Some("long".to_string()));
        assert_eq!(cache.get("c"), Some("new".to_string()));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions(), 0);
        assert_eq!(cache.stats().expirations(), 1);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let (cache, clock) = manual_cache(CacheConfig::default());
        cache.set("k", "v".to_string(), Duration::from_secs(u64::MAX));
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.expire_stale(), 0);
    }

    #[test]
    fn test_disabled_cache() {
        let cache: TtlCache<String> = TtlCache::new(CacheConfig::disabled());
        cache.put("k", "v".to_string());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_json_helpers() {
        let cache = SharedCache::with_defaults();
        cache
            .set_json("k", &vec![1u32, 2, 3], Duration::from_secs(5))
            .unwrap();
        let back: Option<Vec<u32>> = cache.get_json("k").unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));

        let wrong: Result<Option<String>, _> = cache.get_json("k");
        assert!(matches!(wrong, Err(CacheError::Deserialize { .. })));
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let cache = Arc::new(TtlCache::<Vec<u64>>::with_defaults());
        cache.set("k", vec![0; 64], Duration::from_secs(60));
        let mut handles = vec![];

        for i in 1..=8u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    cache.set("k", vec![i; 64], Duration::from_secs(60));
                    let seen = cache.get("k").unwrap();
                    assert!(seen.iter().all(|v| *v == seen[0]));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_expired_entries() {
        let config = CacheConfig::default().with_sweep_interval(Some(Duration::from_secs(1)));
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TtlCache::<String>::with_clock(config, clock.clone()));
        cache.set("gone", "v".to_string(), Duration::from_millis(500));
        cache.set("kept", "v".to_string(), Duration::from_secs(3600));
        clock.advance(Duration::from_secs(1));
        let handle = cache.spawn_sweeper().unwrap();

        // Paused tokio time auto-advances past the first sweep tick.
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("kept"), Some("v".to_string()));
        handle.abort();
    }
}
