//! Validated query plans.

use crate::ast::{ComparisonOp, Expr, Literal, LogicalOp, Projection, SelectStatement};
use blockq_core::{parse_timestamp, DataType, QueryError, Result, Schema, TableId, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub index: usize,
    pub direction: SortDirection,
}

/// Boolean expression tree over columns of the plan's table. Column names
/// are canonical (as declared) and `index` points into the full schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        index: usize,
        op: ComparisonOp,
        value: Value,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Short-circuit evaluation. Null or mismatched comparisons are false.
    pub fn evaluate(&self, row: &[Value]) -> bool {
        match self {
            Predicate::Compare {
                index, op, value, ..
            } => {
                let Some(cell) = row.get(*index) else {
                    return false;
                };
                match cell.compare(value) {
                    Some(ordering) => matches_op(*op, ordering),
                    None => false,
                }
            }
            Predicate::And(left, right) => left.evaluate(row) && right.evaluate(row),
            Predicate::Or(left, right) => left.evaluate(row) || right.evaluate(row),
        }
    }

    /// Lower bound on `column` implied by the top-level conjunction, if any.
    /// Returned as `(value, inclusive)`.
    pub fn lower_bound(&self, column: &str) -> Option<(Value, bool)> {
        match self {
            Predicate::Compare {
                column: c,
                op,
                value,
                ..
            } if c == column => match op {
                ComparisonOp::Greater => Some((value.clone(), false)),
                ComparisonOp::GreaterEqual | ComparisonOp::Equal => Some((value.clone(), true)),
                _ => None,
            },
            Predicate::And(left, right) => left
                .lower_bound(column)
                .or_else(|| right.lower_bound(column)),
            _ => None,
        }
    }
}

fn matches_op(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::Less => ordering == Ordering::Less,
        ComparisonOp::LessEqual => ordering != Ordering::Greater,
        ComparisonOp::Greater => ordering == Ordering::Greater,
        ComparisonOp::GreaterEqual => ordering != Ordering::Less,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: TableId,
    /// Output columns in projection order; `*` is expanded to schema order.
    pub columns: Vec<String>,
    pub wildcard: bool,
    pub predicate: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    /// Range is checked by the executor, not here.
    pub limit: Option<i64>,
}

impl QueryPlan {
    pub fn from_statement(statement: SelectStatement) -> Result<Self> {
        let table: TableId = statement.from.parse()?;
        let schema = table.schema();

        let (columns, wildcard) = match statement.projection {
            Projection::Wildcard => (schema.column_names(), true),
            Projection::Columns(names) => {
                let columns = names
                    .iter()
                    .map(|name| canonical_name(schema, name))
                    .collect::<Result<Vec<_>>>()?;
                (columns, false)
            }
        };

        let predicate = statement
            .selection
            .map(|expr| resolve_predicate(schema, expr))
            .transpose()?;

        let order_by = statement
            .order_by
            .map(|o| -> Result<OrderBy> {
                let index = schema.index_of(&o.column)?;
                Ok(OrderBy {
                    column: schema.fields()[index].name().to_string(),
                    index,
                    direction: if o.asc {
                        SortDirection::Asc
                    } else {
                        SortDirection::Desc
                    },
                })
            })
            .transpose()?;

        Ok(Self {
            table,
            columns,
            wildcard,
            predicate,
            order_by,
            limit: statement.limit,
        })
    }

    pub fn schema(&self) -> &'static Schema {
        self.table.schema()
    }
}

fn canonical_name(schema: &Schema, name: &str) -> Result<String> {
    Ok(schema.field_with_name(name)?.name().to_string())
}

fn resolve_predicate(schema: &Schema, expr: Expr) -> Result<Predicate> {
    match expr {
        Expr::Comparison {
            column,
            op,
            literal,
        } => {
            let index = schema.index_of(&column)?;
            let field = &schema.fields()[index];
            let value = coerce_literal(field.name(), field.data_type(), literal)?;
            Ok(Predicate::Compare {
                column: field.name().to_string(),
                index,
                op,
                value,
            })
        }
        Expr::Logical { left, op, right } => {
            let left = Box::new(resolve_predicate(schema, *left)?);
            let right = Box::new(resolve_predicate(schema, *right)?);
            Ok(match op {
                LogicalOp::And => Predicate::And(left, right),
                LogicalOp::Or => Predicate::Or(left, right),
            })
        }
    }
}

fn coerce_literal(column: &str, data_type: DataType, literal: Literal) -> Result<Value> {
    let mismatch = |found: &str| {
        QueryError::Plan(format!(
            "cannot compare {} column '{}' with {}",
            data_type, column, found
        ))
    };

    match (data_type, literal) {
        (DataType::Integer | DataType::Float, Literal::Number(n)) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| QueryError::Syntax(format!("Invalid number: {}", n)))
            }
        }
        (DataType::String, Literal::String(s)) => Ok(Value::String(s)),
        (DataType::Boolean, Literal::Boolean(b)) => Ok(Value::Boolean(b)),
        (DataType::Timestamp, Literal::Timestamp(t) | Literal::String(t)) => parse_timestamp(&t)
            .map(Value::Timestamp)
            .ok_or_else(|| QueryError::Plan(format!("invalid timestamp literal '{}'", t))),
        (_, Literal::Number(n)) => Err(mismatch(&format!("number {}", n))),
        (_, Literal::String(s)) => Err(mismatch(&format!("string '{}'", s))),
        (_, Literal::Timestamp(t)) => Err(mismatch(&format!("timestamp {}", t))),
        (_, Literal::Boolean(b)) => Err(mismatch(&format!("boolean {}", b))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_is_deterministic() {
        let query = "SELECT slot, tps FROM slots WHERE tps > 100 AND slot >= 5 ORDER BY tps DESC LIMIT 3";
        assert_eq!(parse(query).unwrap(), parse(query).unwrap());
    }

    #[test]
    fn test_wildcard_expands_in_schema_order() {
        let plan = parse("SELECT * FROM validators").unwrap();
        assert!(plan.wildcard);
        assert_eq!(plan.columns, TableId::Validators.schema().column_names());
    }

    #[test]
    fn test_projection_order_preserved_and_canonicalized() {
        let plan = parse("SELECT TPS, Slot FROM SLOTS").unwrap();
        assert_eq!(plan.table, TableId::Slots);
        assert_eq!(plan.columns, vec!["tps".to_string(), "slot".to_string()]);
    }

    #[test]
    fn test_unknown_table() {
        assert_eq!(
            parse("SELECT * FROM bogus").unwrap_err(),
            QueryError::UnknownTable("bogus".into())
        );
    }

    #[test]
    fn test_unknown_columns_everywhere() {
        for query in [
            "SELECT nope FROM slots",
            "SELECT * FROM slots WHERE nope = 1",
            "SELECT * FROM slots ORDER BY nope",
        ] {
            assert!(
                matches!(parse(query), Err(QueryError::UnknownColumn { .. })),
                "expected unknown column for {:?}",
                query
            );
        }
    }

    #[test]
    fn test_syntax_checked_before_semantics() {
        assert!(matches!(
            parse("SELECT * FROM bogus WHERE"),
            Err(QueryError::Syntax(_))
        ));
    }

    #[test]
    fn test_literal_coercion() {
        let plan = parse("SELECT * FROM transactions WHERE block_time >= '2024-03-01' AND amount > 1.5").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        match plan.predicate.unwrap() {
            Predicate::And(left, right) => {
                assert!(matches!(*left, Predicate::Compare { value: Value::Timestamp(t), .. } if t == ts));
                assert!(matches!(*right, Predicate::Compare { value: Value::Float(f), .. } if f == 1.5));
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_is_plan_error() {
        assert!(matches!(
            parse("SELECT * FROM slots WHERE slot = 'abc'"),
            Err(QueryError::Plan(_))
        ));
        assert!(matches!(
            parse("SELECT * FROM validators WHERE delinquent = 1"),
            Err(QueryError::Plan(_))
        ));
        assert!(matches!(
            parse("SELECT * FROM transactions WHERE block_time > 'soon'"),
            Err(QueryError::Plan(_))
        ));
    }

    #[test]
    fn test_predicate_evaluation_with_nulls() {
        let plan = parse("SELECT * FROM transactions WHERE fee > 10 OR status = 'ok'").unwrap();
        let predicate = plan.predicate.unwrap();
        let row = |fee: Value, status: &str| {
            vec![
                Value::from("sig"),
                Value::Integer(1),
                Value::Null,
                Value::from(status),
                fee,
                Value::Null,
            ]
        };
        assert!(predicate.evaluate(&row(Value::Integer(11), "err")));
        assert!(predicate.evaluate(&row(Value::Null, "ok")));
        assert!(!predicate.evaluate(&row(Value::Null, "err")));
    }

    #[test]
    fn test_lower_bound_from_conjunction() {
        let plan = parse("SELECT * FROM slots WHERE tps > 1 AND slot > 100").unwrap();
        assert_eq!(
            plan.predicate.as_ref().unwrap().lower_bound("slot"),
            Some((Value::Integer(100), false))
        );
        let plan = parse("SELECT * FROM slots WHERE tps > 1 OR slot > 100").unwrap();
        assert_eq!(plan.predicate.unwrap().lower_bound("slot"), None);
    }
}
