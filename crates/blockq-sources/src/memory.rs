//! In-memory data source
//!
//! Serves fixed rows per table. Used for fixtures and for embedding
//! pre-materialized data; it also counts fetches so callers can assert
//! whether an adapter was reached at all.

use crate::source::{Cursor, DataSource, Row, RowSet};
use async_trait::async_trait;
use blockq_core::{QueryError, Result, TableId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<TableId, Vec<Row>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register rows for a table. Rows are padded with nulls to the table's
    /// stored width.
    pub fn with_rows(mut self, table: TableId, rows: Vec<Row>) -> Self {
        let width = table.stored_width();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, blockq_core::Value::Null);
                }
                row
            })
            .collect();
        self.tables.insert(table, rows);
        self
    }

    /// Number of `fetch_rows` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_rows(&self, table: TableId, _since: Option<Cursor>) -> Result<RowSet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(&table)
            .map(|rows| RowSet::live(rows.clone()))
            .ok_or_else(|| QueryError::data_source(table.name(), "no rows registered"))
    }
}
