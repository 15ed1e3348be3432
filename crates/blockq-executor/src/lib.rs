//! Query execution for blockq plans
//!
//! [`QueryExecutor`] fetches a table's rows from its registered adapter and
//! applies the plan: filter, stable sort, limit, then projection.

pub mod executor;

pub use executor::{QueryExecutor, DEFAULT_FETCH_TIMEOUT};
