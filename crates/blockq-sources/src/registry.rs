use crate::source::DataSource;
use blockq_core::{QueryError, Result, TableId};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each virtual table to the adapter that serves it.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<TableId, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every table is served by `source`.
    pub fn with_source_for_all(source: Arc<dyn DataSource>) -> Self {
        let mut registry = Self::new();
        for table in TableId::ALL {
            registry.register(table, source.clone());
        }
        registry
    }

    /// Route `table` to `source`, replacing any previous adapter.
    pub fn register(&mut self, table: TableId, source: Arc<dyn DataSource>) {
        self.sources.insert(table, source);
    }

    pub fn get(&self, table: TableId) -> Result<Arc<dyn DataSource>> {
        self.sources.get(&table).cloned().ok_or_else(|| {
            QueryError::data_source(table.name(), "no data source registered")
        })
    }

    /// Tables with a registered adapter, in catalog order.
    pub fn tables(&self) -> Vec<TableId> {
        TableId::ALL
            .into_iter()
            .filter(|t| self.sources.contains_key(t))
            .collect()
    }
}
