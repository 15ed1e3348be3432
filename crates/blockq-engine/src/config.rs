//! Engine configuration, loadable from a JSON file.

use blockq_cache::CacheConfig;
use blockq_sources::RpcConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Time left for the mock fallback once the RPC source has given up.
pub const FALLBACK_ALLOWANCE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a query result stays cached
    pub query_ttl_secs: u64,
    /// History entries kept per owner
    pub history_capacity: usize,
    /// Upper bound on one adapter fetch. Raised when the RPC retry policy
    /// plus the mock fallback could not finish inside it.
    pub adapter_timeout_ms: u64,
    pub cache: CacheSettings,
    /// Live RPC upstream; without it only mock data is served
    pub rpc: Option<RpcConfig>,
    /// Serve RPC data from periodically refreshed snapshots of this age
    pub snapshot_max_age_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_ttl_secs: 30,
            history_capacity: 100,
            adapter_timeout_ms: 5_000,
            cache: CacheSettings::default(),
            rpc: None,
            snapshot_max_age_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn query_ttl(&self) -> Duration {
        Duration::from_secs(self.query_ttl_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        let configured = Duration::from_millis(self.adapter_timeout_ms);
        match &self.rpc {
            Some(rpc) => configured.max(
                rpc.worst_case_duration()
                    .saturating_add(FALLBACK_ALLOWANCE),
            ),
            None => configured,
        }
    }
}

/// Serializable form of [`CacheConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub default_ttl_secs: u64,
    /// `null` disables the background sweeper
    pub sweep_interval_secs: Option<u64>,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            default_ttl_secs: defaults.default_ttl.as_secs(),
            sweep_interval_secs: defaults.sweep_interval.map(|d| d.as_secs()),
            enabled: defaults.enabled,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        CacheConfig::new(settings.max_entries, settings.default_ttl_secs)
            .with_sweep_interval(
                settings
                    .sweep_interval_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            )
            .with_enabled(settings.enabled)
    }
}
