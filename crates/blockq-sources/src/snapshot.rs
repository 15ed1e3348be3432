//! Periodically refreshed snapshots
//!
//! Wraps an upstream source and keeps the last successful row set per table.
//! Snapshots younger than `max_age` are served without touching the upstream.
//! When a refresh fails and an older snapshot exists, the stale rows are
//! served as degraded instead of failing the query.

use crate::source::{Cursor, DataSource, RowSet};
use async_trait::async_trait;
use blockq_core::{Result, TableId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SnapshotSource {
    upstream: Arc<dyn DataSource>,
    max_age: Duration,
    snapshots: RwLock<HashMap<TableId, (RowSet, Instant)>>,
}

impl SnapshotSource {
    pub fn new(upstream: Arc<dyn DataSource>, max_age: Duration) -> Self {
        Self {
            upstream,
            max_age,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch `table` from upstream and replace its snapshot.
    pub async fn refresh(&self, table: TableId) -> Result<RowSet> {
        let rows = self.upstream.fetch_rows(table, None).await?;
        debug!(table = %table, rows = rows.rows.len(), "Snapshot refreshed");
        self.snapshots
            .write()
            .insert(table, (rows.clone(), Instant::now()));
        Ok(rows)
    }

    /// Refresh every table, logging failures. Returns how many succeeded.
    pub async fn refresh_all(&self) -> usize {
        let mut refreshed = 0;
        for table in TableId::ALL {
            match self.refresh(table).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(table = %table, error = %e, "Snapshot refresh failed"),
            }
        }
        refreshed
    }

    /// Start a background task refreshing all tables every `max_age`.
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.max_age.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let Some(source) = weak.upgrade() else {
                    break;
                };
                let refreshed = source.refresh_all().await;
                info!(refreshed, "Snapshot refresh cycle complete");
            }
        })
    }

    fn cached(&self, table: TableId) -> Option<(RowSet, Instant)> {
        self.snapshots.read().get(&table).cloned()
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn fetch_rows(&self, table: TableId, _since: Option<Cursor>) -> Result<RowSet> {
        let cached = self.cached(table);
        if let Some((rows, taken_at)) = &cached {
            if taken_at.elapsed() < self.max_age {
                return Ok(rows.clone());
            }
        }

        match self.refresh(table).await {
            Ok(rows) => Ok(rows),
            Err(e) => match cached {
                Some((rows, taken_at)) => {
                    warn!(
                        table = %table,
                        age = ?taken_at.elapsed(),
                        error = %e,
                        "Serving stale snapshot"
                    );
                    Ok(rows.into_degraded())
                }
                None => Err(e),
            },
        }
    }
}
