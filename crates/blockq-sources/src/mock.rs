//! Synthetic data generator
//!
//! Produces plausible rows for every virtual table when no live upstream is
//! reachable. Output is deterministic for a given seed and anchor time, and
//! always reported as [`Freshness::Degraded`](crate::Freshness::Degraded).

use crate::source::{Cursor, DataSource, Row, RowSet};
use async_trait::async_trait;
use blockq_core::{Result, TableId, Value};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BASE_SLOT: i64 = 250_000_000;
const SLOTS_PER_SAMPLE: i64 = 150;
const SAMPLE_SECS: i64 = 60;
const COMMISSIONS: [i64; 6] = [0, 5, 7, 8, 10, 100];

/// (mint, symbol, decimals)
const KNOWN_MINTS: &[(&str, &str, i64)] = &[
    ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6),
    ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", 6),
    ("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", "BONK", 5),
    ("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", "JUP", 6),
    ("So11111111111111111111111111111111111111112", "wSOL", 9),
];

#[derive(Debug, Clone)]
pub struct MockSource {
    seed: u64,
    anchor: DateTime<Utc>,
    slot_samples: usize,
    transactions: usize,
    validators: usize,
}

impl MockSource {
    pub fn new(seed: u64) -> Self {
        Self::with_anchor(seed, Utc::now())
    }

    /// Fixes the "now" that generated timestamps count back from.
    pub fn with_anchor(seed: u64, anchor: DateTime<Utc>) -> Self {
        Self {
            seed,
            anchor,
            slot_samples: 60,
            transactions: 100,
            validators: 25,
        }
    }

    pub fn with_sizes(mut self, slot_samples: usize, transactions: usize, validators: usize) -> Self {
        self.slot_samples = slot_samples;
        self.transactions = transactions;
        self.validators = validators;
        self
    }

    fn rng_for(&self, table: TableId) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (table as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn slots(&self, rng: &mut StdRng) -> Vec<Row> {
        (0..self.slot_samples as i64)
            .map(|i| {
                let transactions: i64 = rng.gen_range(120_000..240_000);
                let non_vote = transactions * rng.gen_range(15..30) / 100;
                vec![
                    Value::Integer(BASE_SLOT - i * SLOTS_PER_SAMPLE),
                    Value::Timestamp(self.anchor - ChronoDuration::seconds(i * SAMPLE_SECS)),
                    Value::Integer(SLOTS_PER_SAMPLE),
                    Value::Integer(transactions),
                    Value::Integer(non_vote),
                    Value::Integer(SAMPLE_SECS),
                ]
            })
            .collect()
    }

    fn transactions(&self, rng: &mut StdRng) -> Vec<Row> {
        (0..self.transactions as i64)
            .map(|i| {
                let status = if rng.gen_bool(0.05) { "failed" } else { "success" };
                let amount = (rng.gen_range(0.001..1_000.0_f64) * 10_000.0).round() / 10_000.0;
                vec![
                    Value::String(random_id(rng, 64)),
                    Value::Integer(BASE_SLOT - i * 3),
                    Value::Timestamp(self.anchor - ChronoDuration::milliseconds(i * 1_200)),
                    Value::from(status),
                    Value::Integer(5_000 + rng.gen_range(0..20) * 1_000),
                    Value::Float(amount),
                ]
            })
            .collect()
    }

    fn token_supply(&self, rng: &mut StdRng) -> Vec<Row> {
        KNOWN_MINTS
            .iter()
            .map(|(mint, symbol, decimals)| {
                let supply = (rng.gen_range(1.0e8..5.0e10_f64)).round();
                vec![
                    Value::from(*mint),
                    Value::from(*symbol),
                    Value::Float(supply),
                    Value::Integer(*decimals),
                    Value::Timestamp(self.anchor),
                ]
            })
            .collect()
    }

    fn validators(&self, rng: &mut StdRng) -> Vec<Row> {
        (0..self.validators)
            .map(|_| {
                let last_vote = BASE_SLOT - rng.gen_range(0..200);
                vec![
                    Value::String(random_id(rng, 44)),
                    Value::String(random_id(rng, 44)),
                    Value::Integer(rng.gen_range(10_000..20_000_000) * 1_000_000_000),
                    Value::Integer(COMMISSIONS[rng.gen_range(0..COMMISSIONS.len())]),
                    Value::Integer(last_vote),
                    Value::Integer(last_vote - 32),
                    Value::Boolean(rng.gen_bool(0.04)),
                ]
            })
            .collect()
    }
}

fn random_id(rng: &mut StdRng, len: usize) -> String {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_rows(&self, table: TableId, since: Option<Cursor>) -> Result<RowSet> {
        let mut rng = self.rng_for(table);
        let mut rows = match table {
            TableId::Slots => self.slots(&mut rng),
            TableId::Transactions => self.transactions(&mut rng),
            TableId::TokenSupply => self.token_supply(&mut rng),
            TableId::Validators => self.validators(&mut rng),
        };

        if let (Some(cursor), TableId::Slots | TableId::Transactions) = (since, table) {
            rows.retain(|row| slot_of(table, row).map_or(true, |slot| cursor.admits(slot)));
        }

        Ok(RowSet::degraded(rows))
    }
}

fn slot_of(table: TableId, row: &Row) -> Option<i64> {
    let index = match table {
        TableId::Slots => 0,
        TableId::Transactions => 1,
        _ => return None,
    };
    match row.get(index) {
        Some(Value::Integer(slot)) => Some(*slot),
        _ => None,
    }
}
