use crate::cache_key::query_result_key;
use crate::config::EngineConfig;
use crate::history::{QueryHistory, QueryHistoryEntry};
use crate::interpretation::{AnalysisCache, DEFAULT_ANALYSIS_TTL};
use crate::saved::{SavedQueries, SavedQuery};
use crate::templates::{templates, QueryTemplate};
use blockq_cache::{CacheStatsSnapshot, SharedCache};
use blockq_core::{QueryResult, Result};
use blockq_executor::QueryExecutor;
use blockq_parser::normalize;
use blockq_sources::SourceRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

#[derive(Debug, Default)]
struct OwnerState {
    history: QueryHistory,
    saved: SavedQueries,
}

/// Entry point for running queries.
///
/// Results are cached in the shared cache under a key derived from the
/// normalized query text. History and saved queries are kept per owner; the
/// owner is whatever identity the caller passes in.
#[derive(Debug)]
pub struct QueryEngine {
    executor: QueryExecutor,
    cache: Arc<SharedCache>,
    query_ttl: Duration,
    history_capacity: usize,
    owners: DashMap<String, OwnerState>,
}

impl QueryEngine {
    pub fn new(sources: Arc<SourceRegistry>, cache: Arc<SharedCache>, config: &EngineConfig) -> Self {
        let adapter_timeout = config.adapter_timeout();
        if adapter_timeout > Duration::from_millis(config.adapter_timeout_ms) {
            warn!(
                configured_ms = config.adapter_timeout_ms,
                effective_ms = adapter_timeout.as_millis() as u64,
                "Adapter timeout raised to fit RPC retries and fallback"
            );
        }

        Self {
            executor: QueryExecutor::with_timeout(sources, adapter_timeout),
            cache,
            query_ttl: config.query_ttl(),
            history_capacity: config.history_capacity,
            owners: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    /// Analysis cache sharing this engine's cache handle.
    pub fn analysis_cache(&self) -> AnalysisCache {
        AnalysisCache::new(self.cache.clone(), DEFAULT_ANALYSIS_TTL)
    }

    /// Runs `text` for `owner`, serving a cached result when one is live.
    ///
    /// Every call appends one history entry. Failures are never cached.
    #[instrument(skip(self, text))]
    pub async fn execute_query(&self, text: &str, owner: &str) -> Result<QueryResult> {
        let started = Instant::now();
        let outcome = self.run(text).await;
        let elapsed = started.elapsed();

        let entry = match &outcome {
            Ok((result, cache_hit)) => {
                QueryHistoryEntry::success(text, result.row_count, elapsed, *cache_hit)
            }
            Err(e) => {
                debug!(error = %e, "Query failed");
                QueryHistoryEntry::failure(text, e.kind(), elapsed)
            }
        };
        self.with_owner(owner, |state| state.history.push(entry));

        outcome.map(|(result, _)| result)
    }

    async fn run(&self, text: &str) -> Result<(QueryResult, bool)> {
        let key = query_result_key(&normalize(text)?);

        match self.cache.get_json::<QueryResult>(&key) {
            Ok(Some(result)) => {
                debug!(key = %key, "Query cache hit");
                return Ok((result, true));
            }
            Ok(None) => debug!(key = %key, "Query cache miss"),
            Err(e) => warn!(error = %e, "Query cache unreadable, executing live"),
        }

        let plan = blockq_parser::parse(text)?;
        let result = self.executor.execute(&plan).await?;

        if result.degraded {
            debug!("Not caching degraded result");
        } else if let Err(e) = self.cache.set_json(key, &result, self.query_ttl) {
            warn!(error = %e, "Failed to cache query result");
        }

        Ok((result, false))
    }

    /// Stores `text` under `name`, replacing any previous query of that name.
    /// The text is not validated.
    pub fn save_query(&self, owner: &str, name: &str, text: &str) -> SavedQuery {
        self.with_owner(owner, |state| state.saved.save(name, text))
    }

    pub fn list_saved_queries(&self, owner: &str) -> Vec<SavedQuery> {
        self.owners
            .get(owner)
            .map(|state| state.saved.list())
            .unwrap_or_default()
    }

    pub fn get_saved_query(&self, owner: &str, name: &str) -> Option<SavedQuery> {
        self.owners
            .get(owner)
            .and_then(|state| state.saved.get(name).cloned())
    }

    pub fn delete_saved_query(&self, owner: &str, name: &str) -> bool {
        self.owners
            .get_mut(owner)
            .map(|mut state| state.saved.delete(name))
            .unwrap_or(false)
    }

    /// Runs a saved query. `Ok(None)` when `owner` has no query named `name`.
    pub async fn run_saved_query(&self, owner: &str, name: &str) -> Result<Option<QueryResult>> {
        let Some(saved) = self.get_saved_query(owner, name) else {
            return Ok(None);
        };
        self.execute_query(&saved.query, owner).await.map(Some)
    }

    /// Most recent first.
    pub fn get_history(&self, owner: &str) -> Vec<QueryHistoryEntry> {
        self.owners
            .get(owner)
            .map(|state| state.history.recent())
            .unwrap_or_default()
    }

    pub fn templates(&self) -> &'static [QueryTemplate] {
        templates()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats().snapshot()
    }

    /// Serialized access to one owner's state. Never held across an await.
    fn with_owner<T>(&self, owner: &str, f: impl FnOnce(&mut OwnerState) -> T) -> T {
        let mut state = self
            .owners
            .entry(owner.to_string())
            .or_insert_with(|| OwnerState {
                history: QueryHistory::new(self.history_capacity),
                saved: SavedQueries::new(),
            });
        f(&mut *state)
    }
}
