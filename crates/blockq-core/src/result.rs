use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Columnar query output. Every row holds exactly `columns.len()` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// True when any row came from fallback (non-live) data.
    #[serde(default)]
    pub degraded: bool,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>, degraded: bool) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            degraded,
        }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self::new(columns, vec![], false)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
