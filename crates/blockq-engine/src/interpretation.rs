//! Cache helper for the AI-interpretation caller.
//!
//! Shares the engine's cache handle under the `ai-analysis:` namespace. The
//! interpretation itself is computed by the caller; this type only
//! memoizes it.

use crate::cache_key::ai_analysis_key;
use blockq_cache::SharedCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ANALYSIS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct AnalysisCache {
    cache: Arc<SharedCache>,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(cache: Arc<SharedCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cached analysis for `input`. Unreadable entries count as absent.
    pub fn get<T: DeserializeOwned>(&self, input: &str) -> Option<T> {
        match self.cache.get_json(&ai_analysis_key(input)) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable analysis cache entry");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, input: &str, analysis: &T) {
        if let Err(e) = self.cache.set_json(ai_analysis_key(input), analysis, self.ttl) {
            warn!(error = %e, "Failed to cache analysis");
        }
    }

    pub fn invalidate(&self, input: &str) -> bool {
        self.cache.invalidate(&ai_analysis_key(input))
    }

    /// Returns the cached analysis or runs `compute` and caches its output.
    /// Errors from `compute` are returned and never cached.
    pub async fn get_or_compute<T, E, F, Fut>(&self, input: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(input) {
            debug!("Analysis cache hit");
            return Ok(hit);
        }

        let analysis = compute().await?;
        self.set(input, &analysis);
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockq_cache::{CacheConfig, ManualClock, TtlCache};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Analysis {
        summary: String,
        risk: u8,
    }

    fn analysis() -> Analysis {
        Analysis {
            summary: "mostly swaps".into(),
            risk: 2,
        }
    }

    #[tokio::test]
    async fn test_get_or_compute_memoizes() {
        let cache: Arc<SharedCache> = Arc::new(TtlCache::new(CacheConfig::default()));
        let analyses = AnalysisCache::new(cache, DEFAULT_ANALYSIS_TTL);
        let mut calls = 0;

        for _ in 0..2 {
            let result: Result<Analysis, String> = analyses
                .get_or_compute("wallet-1", || {
                    calls += 1;
                    async { Ok(analysis()) }
                })
                .await;
            assert_eq!(result.unwrap(), analysis());
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: Arc<SharedCache> = Arc::new(TtlCache::new(CacheConfig::default()));
        let analyses = AnalysisCache::new(cache.clone(), DEFAULT_ANALYSIS_TTL);

        let failed: Result<Analysis, String> = analyses
            .get_or_compute("wallet-1", || async { Err("model unavailable".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_entry_recomputes() {
        let cache: Arc<SharedCache> = Arc::new(TtlCache::new(CacheConfig::default()));
        cache.set(ai_analysis_key("wallet-1"), Arc::from("{broken"), DEFAULT_ANALYSIS_TTL);
        let analyses = AnalysisCache::new(cache, DEFAULT_ANALYSIS_TTL);

        let result: Result<Analysis, String> = analyses
            .get_or_compute("wallet-1", || async { Ok(analysis()) })
            .await;
        assert_eq!(result.unwrap(), analysis());
        assert_eq!(analyses.get::<Analysis>("wallet-1"), Some(analysis()));
    }

    #[test]
    fn test_entries_expire() {
        let clock = Arc::new(ManualClock::new());
        let cache: Arc<SharedCache> = Arc::new(TtlCache::with_clock(CacheConfig::default(), clock.clone()));
        let analyses = AnalysisCache::new(cache, Duration::from_secs(60));

        analyses.set("wallet-1", &analysis());
        assert!(analyses.get::<Analysis>("wallet-1").is_some());

        clock.advance(Duration::from_secs(60));
        assert!(analyses.get::<Analysis>("wallet-1").is_none());
    }
}
