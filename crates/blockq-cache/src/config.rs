//! Cache configuration options

use std::time::Duration;

/// Configuration for a [`TtlCache`](crate::TtlCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction kicks in
    pub max_entries: usize,
    /// TTL applied by `put` when the caller does not pass one
    pub default_ttl: Duration,
    /// How often the background sweeper reclaims expired entries;
    /// `None` disables the sweeper and relies on lazy expiry alone
    pub sweep_interval: Option<Duration>,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300), // 5 minutes
            sweep_interval: Some(Duration::from_secs(60)),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new(max_entries: usize, default_ttl_secs: u64) -> Self {
        Self {
            max_entries,
            default_ttl: Duration::from_secs(default_ttl_secs),
            ..Default::default()
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
