//! Result rendering at the engine boundary.
//!
//! CSV output does not quote or escape values; a string containing a comma
//! or newline produces a malformed row.

use blockq_core::{QueryError, QueryResult, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Json => JSON_CONTENT_TYPE,
            OutputFormat::Csv => CSV_CONTENT_TYPE,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Header line of column names, then one line per row. Nulls render empty.
pub fn to_csv(result: &QueryResult) -> String {
    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(result.columns.join(","));
    for row in &result.rows {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        lines.push(fields.join(","));
    }
    lines.join("\n")
}

/// `{ success: true, data: { columns, rows, rowCount, degraded }, timestamp }`
pub fn to_json(result: &QueryResult, timestamp: DateTime<Utc>) -> JsonValue {
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| JsonValue::Array(row.iter().map(|v| v.to_json()).collect()))
        .collect();

    json!({
        "success": true,
        "data": {
            "columns": result.columns,
            "rows": rows,
            "rowCount": result.row_count,
            "degraded": result.degraded,
        },
        "timestamp": timestamp.to_rfc3339(),
    })
}

/// `{ success: false, error, kind }`
pub fn error_json(error: &QueryError) -> JsonValue {
    json!({
        "success": false,
        "error": error.to_string(),
        "kind": error.kind(),
    })
}

/// Rendered body plus its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResponse {
    pub content_type: &'static str,
    pub body: String,
}

/// Renders a query outcome. Failures are always JSON, whatever the
/// requested format.
pub fn respond(outcome: &Result<QueryResult>, format: OutputFormat) -> FormattedResponse {
    match (outcome, format) {
        (Ok(result), OutputFormat::Csv) => FormattedResponse {
            content_type: CSV_CONTENT_TYPE,
            body: to_csv(result),
        },
        (Ok(result), OutputFormat::Json) => FormattedResponse {
            content_type: JSON_CONTENT_TYPE,
            body: to_json(result, Utc::now()).to_string(),
        },
        (Err(error), _) => FormattedResponse {
            content_type: JSON_CONTENT_TYPE,
            body: error_json(error).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockq_core::Value;

    fn result() -> QueryResult {
        QueryResult::new(
            vec!["slot".into(), "tps".into(), "status".into()],
            vec![
                vec![Value::Integer(10), Value::Float(2.5), Value::from("success")],
                vec![Value::Integer(9), Value::Float(0.0), Value::Null],
            ],
            false,
        )
    }

    #[test]
    fn test_csv_layout() {
        assert_eq!(to_csv(&result()), "slot,tps,status\n10,2.5,success\n9,0,");
    }

    #[test]
    fn test_csv_empty_result_is_header_only() {
        let empty = QueryResult::empty(vec!["a".into(), "b".into()]);
        assert_eq!(to_csv(&empty), "a,b");
    }

    #[test]
    fn test_json_envelope() {
        let json = to_json(&result(), Utc::now());
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["rowCount"], 2);
        assert_eq!(json["data"]["columns"][1], "tps");
        assert_eq!(json["data"]["rows"][0][1], 2.5);
        assert!(json["data"]["rows"][1][2].is_null());
        assert_eq!(json["data"]["degraded"], false);
    }

    #[test]
    fn test_error_response_is_json() {
        let outcome: Result<QueryResult> = Err(QueryError::UnknownTable("bogus".into()));
        let response = respond(&outcome, OutputFormat::Csv);
        assert_eq!(response.content_type, JSON_CONTENT_TYPE);

        let body: JsonValue = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "unknown_table");
        assert!(body["error"].as_str().unwrap().contains("bogus"));
    }

    #[test]
    fn test_csv_content_type() {
        let response = respond(&Ok(result()), OutputFormat::Csv);
        assert_eq!(response.content_type, "text/csv");
        assert!(response.body.starts_with("slot,tps,status"));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
