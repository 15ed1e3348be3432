use blockq_core::{QueryError, QueryResult, Result, Schema, TableId, Value};
use blockq_parser::{OrderBy, Predicate, QueryPlan, SortDirection};
use blockq_sources::{Cursor, Row, SourceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Upper bound on a single adapter fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs validated plans against the registered data sources.
///
/// The pipeline is fixed: fetch, derive, filter, sort, limit, project.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    sources: Arc<SourceRegistry>,
    fetch_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(sources: Arc<SourceRegistry>) -> Self {
        Self::with_timeout(sources, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(sources: Arc<SourceRegistry>, fetch_timeout: Duration) -> Self {
        Self {
            sources,
            fetch_timeout,
        }
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    #[instrument(skip(self, plan), fields(table = %plan.table))]
    pub async fn execute(&self, plan: &QueryPlan) -> Result<QueryResult> {
        let limit = validate_limit(plan.limit)?;
        let schema = plan.schema();

        let source = self.sources.get(plan.table)?;
        let cursor = slot_cursor(plan);
        let fetch = source.fetch_rows(plan.table, cursor);
        let row_set = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                QueryError::timeout(plan.table.name(), self.fetch_timeout.as_millis() as u64)
            })??;

        let degraded = row_set.is_degraded();
        debug!(
            source = source.name(),
            rows = row_set.rows.len(),
            degraded,
            "Fetched rows"
        );

        let rows = self.execute_derive(plan.table, schema, row_set.rows)?;
        let rows = self.execute_filter(rows, plan.predicate.as_ref());
        let rows = self.execute_sort(rows, plan.order_by.as_ref());
        let rows = self.execute_limit(rows, limit);
        let rows = self.execute_projection(rows, schema, &plan.columns)?;

        Ok(QueryResult::new(plan.columns.clone(), rows, degraded))
    }

    /// Checks stored width and cell kinds, then appends derived columns so
    /// every row matches the full schema.
    fn execute_derive(&self, table: TableId, schema: &Schema, rows: Vec<Row>) -> Result<Vec<Row>> {
        let stored = table.stored_width();
        let derived = table.derived();

        rows.into_iter()
            .map(|mut row| {
                if row.len() > stored {
                    return Err(QueryError::data_source(
                        table.name(),
                        format!("row has {} values, expected {}", row.len(), stored),
                    ));
                }
                if let Some((field, actual)) = schema
                    .fields()
                    .iter()
                    .zip(&row)
                    .find_map(|(field, value)| match value.data_type() {
                        Some(actual) if actual != field.data_type() => Some((field, actual)),
                        _ => None,
                    })
                {
                    return Err(QueryError::data_source(
                        table.name(),
                        format!(
                            "column '{}' expects {}, got {}",
                            field.name(),
                            field.data_type(),
                            actual
                        ),
                    ));
                }
                row.resize(stored, Value::Null);
                let extra: Vec<Value> = derived.iter().map(|d| d.evaluate(schema, &row)).collect();
                row.extend(extra);
                Ok(row)
            })
            .collect()
    }

    fn execute_filter(&self, rows: Vec<Row>, predicate: Option<&Predicate>) -> Vec<Row> {
        match predicate {
            Some(predicate) => rows.into_iter().filter(|r| predicate.evaluate(r)).collect(),
            None => rows,
        }
    }

    /// Stable: rows with equal keys keep their fetch order in both directions.
    fn execute_sort(&self, mut rows: Vec<Row>, order_by: Option<&OrderBy>) -> Vec<Row> {
        if let Some(order) = order_by {
            let index = order.index;
            rows.sort_by(|a, b| {
                let ordering = a[index].sort_cmp(&b[index]);
                match order.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        rows
    }

    fn execute_limit(&self, mut rows: Vec<Row>, limit: Option<usize>) -> Vec<Row> {
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        rows
    }

    fn execute_projection(&self, rows: Vec<Row>, schema: &Schema, columns: &[String]) -> Result<Vec<Row>> {
        let indices = columns
            .iter()
            .map(|c| schema.index_of(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }
}

fn validate_limit(limit: Option<i64>) -> Result<Option<usize>> {
    match limit {
        None => Ok(None),
        Some(n) if n > 0 => Ok(Some(n as usize)),
        Some(n) => Err(QueryError::Plan(format!(
            "LIMIT must be a positive integer, got {}",
            n
        ))),
    }
}

/// Slot lower bound an adapter can use to trim its fetch.
fn slot_cursor(plan: &QueryPlan) -> Option<Cursor> {
    if !matches!(plan.table, TableId::Slots | TableId::Transactions) {
        return None;
    }
    match plan.predicate.as_ref()?.lower_bound("slot")? {
        (Value::Integer(slot), inclusive) => Some(Cursor { slot, inclusive }),
        _ => None,
    }
}
