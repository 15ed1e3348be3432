use async_trait::async_trait;
use blockq_core::{Result, TableId, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One row in the table's stored-column order. Adapters fill fields they
/// cannot supply with [`Value::Null`].
pub type Row = Vec<Value>;

/// Whether rows came from the live upstream or from a substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Live,
    /// Fallback, synthetic, or stale snapshot data
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub freshness: Freshness,
}

impl RowSet {
    pub fn live(rows: Vec<Row>) -> Self {
        Self {
            rows,
            freshness: Freshness::Live,
        }
    }

    pub fn degraded(rows: Vec<Row>) -> Self {
        Self {
            rows,
            freshness: Freshness::Degraded,
        }
    }

    pub fn into_degraded(self) -> Self {
        Self::degraded(self.rows)
    }

    pub fn is_degraded(&self) -> bool {
        self.freshness == Freshness::Degraded
    }
}

/// Lower slot bound an adapter may use to skip rows the query filters out
/// anyway. Adapters are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub slot: i64,
    pub inclusive: bool,
}

impl Cursor {
    pub fn admits(&self, slot: i64) -> bool {
        if self.inclusive {
            slot >= self.slot
        } else {
            slot > self.slot
        }
    }
}

/// Provider of read-only rows for one or more virtual tables.
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a finite row set. Adapters apply their own retry policy before
    /// failing with a `DataSource` error.
    async fn fetch_rows(&self, table: TableId, since: Option<Cursor>) -> Result<RowSet>;
}
