pub mod catalog;
pub mod error;
pub mod result;
pub mod schema;
pub mod types;

pub use catalog::{DerivedColumn, TableId};
pub use error::{ErrorKind, QueryError, Result};
pub use result::QueryResult;
pub use schema::{Field, Schema};
pub use types::*;
