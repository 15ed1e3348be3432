use crate::source::{Cursor, DataSource, RowSet};
use async_trait::async_trait;
use blockq_core::{Result, TableId};
use std::sync::Arc;
use tracing::warn;

/// Tries `primary` first and serves `fallback` rows, marked degraded, when the
/// primary fails. If both fail the primary's error is returned.
#[derive(Debug, Clone)]
pub struct FallbackSource {
    primary: Arc<dyn DataSource>,
    fallback: Arc<dyn DataSource>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn DataSource>, fallback: Arc<dyn DataSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl DataSource for FallbackSource {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn fetch_rows(&self, table: TableId, since: Option<Cursor>) -> Result<RowSet> {
        match self.primary.fetch_rows(table, since).await {
            Ok(rows) => Ok(rows),
            Err(primary_err) => {
                warn!(
                    table = %table,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %primary_err,
                    "Primary source failed, serving fallback rows"
                );
                match self.fallback.fetch_rows(table, since).await {
                    Ok(rows) => Ok(rows.into_degraded()),
                    Err(fallback_err) => {
                        warn!(table = %table, error = %fallback_err, "Fallback source failed too");
                        Err(primary_err)
                    }
                }
            }
        }
    }
}
