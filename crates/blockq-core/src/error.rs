use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Plan error: {0}")]
    Plan(String),

    #[error("Data source error for table '{table}': {message}")]
    DataSource {
        table: String,
        message: String,
        /// Set when the adapter call hit its upper-bound timeout
        timed_out: bool,
    },

    #[error("Cache error: {0}")]
    Cache(String),
}

impl QueryError {
    pub fn data_source(table: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::DataSource {
            table: table.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(table: impl Into<String>, after_ms: u64) -> Self {
        QueryError::DataSource {
            table: table.into(),
            message: format!("timed out after {}ms", after_ms),
            timed_out: true,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Syntax(_) => ErrorKind::Syntax,
            QueryError::UnknownTable(_) => ErrorKind::UnknownTable,
            QueryError::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            QueryError::Plan(_) => ErrorKind::Plan,
            QueryError::DataSource { .. } => ErrorKind::DataSource,
            QueryError::Cache(_) => ErrorKind::Cache,
        }
    }
}

/// Stable, serializable discriminant of [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[serde(rename = "syntax_error")]
    Syntax,
    UnknownTable,
    UnknownColumn,
    #[serde(rename = "plan_error")]
    Plan,
    #[serde(rename = "data_source_error")]
    DataSource,
    #[serde(rename = "cache_error")]
    Cache,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax_error",
            ErrorKind::UnknownTable => "unknown_table",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::Plan => "plan_error",
            ErrorKind::DataSource => "data_source_error",
            ErrorKind::Cache => "cache_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(QueryError::Syntax("x".into()).kind(), ErrorKind::Syntax);
        assert_eq!(
            QueryError::UnknownColumn {
                table: "slots".into(),
                column: "nope".into()
            }
            .kind(),
            ErrorKind::UnknownColumn
        );
        assert_eq!(QueryError::timeout("slots", 50).kind(), ErrorKind::DataSource);
    }

    #[test]
    fn test_timeout_flag() {
        match QueryError::timeout("validators", 250) {
            QueryError::DataSource {
                timed_out, message, ..
            } => {
                assert!(timed_out);
                assert!(message.contains("250ms"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::UnknownTable).unwrap();
        assert_eq!(json, "\"unknown_table\"");
        let json = serde_json::to_string(&ErrorKind::DataSource).unwrap();
        assert_eq!(json, "\"data_source_error\"");
        assert_eq!(ErrorKind::Plan.to_string(), "plan_error");
    }
}
