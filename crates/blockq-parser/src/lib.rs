//! Restricted query language:
//!
//! ```text
//! SELECT <column-list> FROM <table>
//!     [WHERE <predicate>]
//!     [ORDER BY <column> [ASC|DESC]]
//!     [LIMIT <int>]
//! ```
//!
//! [`parse`] runs the syntactic pass first and only then validates table and
//! column names against the catalog, so a malformed statement always reports
//! a syntax error even if it also names an unknown table.

pub mod ast;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod plan;

pub use ast::{ComparisonOp, Expr, Literal, LogicalOp, Projection, SelectStatement};
pub use lexer::{Lexer, Token};
pub use normalize::normalize;
pub use parser::Parser;
pub use plan::{OrderBy, Predicate, QueryPlan, SortDirection};

use blockq_core::Result;

/// Parses and validates query text into an executable plan.
pub fn parse(text: &str) -> Result<QueryPlan> {
    let statement = Parser::new(text)?.parse()?;
    QueryPlan::from_statement(statement)
}
