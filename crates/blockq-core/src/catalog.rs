//! Fixed catalog of virtual tables exposed by the engine.
//!
//! Each table declares its stored columns (supplied by a data source
//! adapter) followed by derived columns that the executor computes from
//! stored ones.

use crate::error::{QueryError, Result};
use crate::schema::{Field, Schema};
use crate::types::{safe_div, DataType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    Slots,
    Transactions,
    TokenSupply,
    Validators,
}

/// A float column computed as `numerator / denominator` over stored columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedColumn {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

impl DerivedColumn {
    /// Evaluates against a row laid out in the table's stored-column order.
    /// Missing or non-numeric inputs yield null; a zero divisor yields 0.
    pub fn evaluate(&self, schema: &Schema, row: &[Value]) -> Value {
        let operand = |name: &str| {
            schema
                .index_of(name)
                .ok()
                .and_then(|i| row.get(i))
                .and_then(Value::as_f64)
        };
        match (operand(self.numerator), operand(self.denominator)) {
            (Some(n), Some(d)) => Value::Float(safe_div(n, d)),
            _ => Value::Null,
        }
    }
}

const SLOTS_DERIVED: &[DerivedColumn] = &[DerivedColumn {
    name: "tps",
    numerator: "transactions",
    denominator: "seconds",
}];

impl TableId {
    pub const ALL: [TableId; 4] = [
        TableId::Slots,
        TableId::Transactions,
        TableId::TokenSupply,
        TableId::Validators,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TableId::Slots => "slots",
            TableId::Transactions => "transactions",
            TableId::TokenSupply => "token_supply",
            TableId::Validators => "validators",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TableId::Slots => "Recent performance samples: transactions and TPS per sample window",
            TableId::Transactions => "Recent transaction signatures for the tracked address",
            TableId::TokenSupply => "Circulating supply of tracked token mints",
            TableId::Validators => "Vote accounts with stake, commission and delinquency",
        }
    }

    /// Full schema: stored columns then derived columns.
    pub fn schema(&self) -> &'static Schema {
        static SLOTS: OnceLock<Schema> = OnceLock::new();
        static TRANSACTIONS: OnceLock<Schema> = OnceLock::new();
        static TOKEN_SUPPLY: OnceLock<Schema> = OnceLock::new();
        static VALIDATORS: OnceLock<Schema> = OnceLock::new();

        let cell = match self {
            TableId::Slots => &SLOTS,
            TableId::Transactions => &TRANSACTIONS,
            TableId::TokenSupply => &TOKEN_SUPPLY,
            TableId::Validators => &VALIDATORS,
        };
        cell.get_or_init(|| {
            let mut fields = self.stored_fields();
            fields.extend(
                self.derived()
                    .iter()
                    .map(|d| Field::new(d.name, DataType::Float, false)),
            );
            Schema::new(self.name(), fields)
        })
    }

    /// Number of columns a data source supplies per row.
    pub fn stored_width(&self) -> usize {
        self.schema().len() - self.derived().len()
    }

    pub fn derived(&self) -> &'static [DerivedColumn] {
        match self {
            TableId::Slots => SLOTS_DERIVED,
            _ => &[],
        }
    }

    fn stored_fields(&self) -> Vec<Field> {
        use DataType::*;
        let f = Field::new;
        match self {
            TableId::Slots => vec![
                f("slot", Integer, false),
                f("sampled_at", Timestamp, true),
                f("num_slots", Integer, false),
                f("transactions", Integer, false),
                f("non_vote_transactions", Integer, true),
                f("seconds", Integer, false),
            ],
            TableId::Transactions => vec![
                f("signature", String, false),
                f("slot", Integer, false),
                f("block_time", Timestamp, true),
                f("status", String, false),
                f("fee", Integer, true),
                f("amount", Float, true),
            ],
            TableId::TokenSupply => vec![
                f("mint", String, false),
                f("symbol", String, true),
                f("supply", Float, false),
                f("decimals", Integer, false),
                f("fetched_at", Timestamp, false),
            ],
            TableId::Validators => vec![
                f("vote_pubkey", String, false),
                f("node_pubkey", String, false),
                f("activated_stake", Integer, false),
                f("commission", Integer, false),
                f("last_vote", Integer, false),
                f("root_slot", Integer, false),
                f("delinquent", Boolean, false),
            ],
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        TableId::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryError::UnknownTable(s.to_string()))
    }
}
