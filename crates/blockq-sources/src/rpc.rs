//! JSON-RPC adapter
//!
//! Maps virtual tables onto Solana-style node RPC methods:
//!
//! | table          | method                           |
//! |----------------|----------------------------------|
//! | `slots`        | `getRecentPerformanceSamples`    |
//! | `transactions` | `getSignaturesForAddress`        |
//! | `token_supply` | `getTokenSupply` (one per mint)  |
//! | `validators`   | `getVoteAccounts`                |
//!
//! Every request carries the configured timeout and goes through the retry
//! policy; only after retries are exhausted does a `DataSource` error surface.
//! Answers the node gave deliberately (an error object, a 4xx status, an
//! undecodable body) are not retried.

use crate::retry::{retry_async, RetryPolicy};
use crate::source::{Cursor, DataSource, Row, RowSet};
use async_trait::async_trait;
use blockq_core::{QueryError, Result, TableId, Value};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMint {
    pub mint: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Mints queried for `token_supply`, fetched concurrently
    pub token_mints: Vec<TokenMint>,
    /// Address whose signatures back the `transactions` table
    pub tracked_address: Option<String>,
    pub sample_limit: usize,
    pub signature_limit: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            request_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            token_mints: vec![
                TokenMint {
                    mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                    symbol: "USDC".to_string(),
                },
                TokenMint {
                    mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
                    symbol: "USDT".to_string(),
                },
            ],
            tracked_address: None,
            sample_limit: 60,
            signature_limit: 100,
        }
    }
}

#[derive(Debug)]
pub struct RpcSource {
    client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceSample {
    slot: i64,
    num_transactions: i64,
    num_slots: i64,
    sample_period_secs: i64,
    num_non_vote_transactions: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureInfo {
    signature: String,
    slot: i64,
    block_time: Option<i64>,
    err: Option<serde_json::Value>,
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    amount: String,
    decimals: i64,
    ui_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VoteAccounts {
    current: Vec<VoteAccount>,
    delinquent: Vec<VoteAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteAccount {
    vote_pubkey: String,
    node_pubkey: String,
    activated_stake: i64,
    commission: i64,
    last_vote: i64,
    root_slot: i64,
}

impl RpcConfig {
    /// Longest a single upstream call can take: every attempt running into
    /// the request timeout plus the largest possible backoff between them.
    pub fn worst_case_duration(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        Duration::from_millis(self.request_timeout_ms)
            .saturating_mul(attempts)
            .saturating_add(self.retry.max_total_delay())
    }
}

/// One failed attempt and whether another attempt could succeed.
#[derive(Debug)]
struct CallError {
    error: QueryError,
    retryable: bool,
}

impl CallError {
    fn permanent(error: QueryError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl RpcSource {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| QueryError::data_source("rpc", format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call<T: DeserializeOwned>(
        &self,
        table: TableId,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        retry_async(
            method,
            &self.config.retry,
            || self.call_once(table, method, params.clone()),
            |e: &CallError| e.retryable,
        )
        .await
        .map_err(|e| e.error)
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        table: TableId,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "Sending RPC request");

        let response = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(table, method, e))?
            .error_for_status()
            .map_err(|e| transport_error(table, method, e))?;

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| transport_error(table, method, e))?;

        if let Some(err) = envelope.error {
            return Err(CallError::permanent(QueryError::data_source(
                table.name(),
                format!("{} returned error {}: {}", method, err.code, err.message),
            )));
        }

        envelope.result.ok_or_else(|| {
            CallError::permanent(QueryError::data_source(
                table.name(),
                format!("{} returned no result", method),
            ))
        })
    }

    async fn fetch_slots(&self) -> Result<Vec<Row>> {
        let samples: Vec<PerformanceSample> = self
            .call(
                TableId::Slots,
                "getRecentPerformanceSamples",
                json!([self.config.sample_limit]),
            )
            .await?;

        // Samples arrive newest first; timestamps are reconstructed by
        // walking back through each sample's period.
        let mut sampled_at = Utc::now();
        Ok(samples
            .into_iter()
            .map(|s| {
                let row = vec![
                    Value::Integer(s.slot),
                    Value::Timestamp(sampled_at),
                    Value::Integer(s.num_slots),
                    Value::Integer(s.num_transactions),
                    Value::from(s.num_non_vote_transactions),
                    Value::Integer(s.sample_period_secs),
                ];
                sampled_at -= ChronoDuration::seconds(s.sample_period_secs);
                row
            })
            .collect())
    }

    async fn fetch_transactions(&self) -> Result<Vec<Row>> {
        let address = self.config.tracked_address.as_deref().ok_or_else(|| {
            QueryError::data_source(TableId::Transactions.name(), "no tracked address configured")
        })?;

        let signatures: Vec<SignatureInfo> = self
            .call(
                TableId::Transactions,
                "getSignaturesForAddress",
                json!([address, { "limit": self.config.signature_limit }]),
            )
            .await?;

        Ok(signatures
            .into_iter()
            .map(|s| {
                let status = if s.err.as_ref().is_some_and(|e| !e.is_null()) {
                    "failed".to_string()
                } else {
                    s.confirmation_status.unwrap_or_else(|| "success".to_string())
                };
                vec![
                    Value::String(s.signature),
                    Value::Integer(s.slot),
                    Value::from(s.block_time.and_then(|t| DateTime::from_timestamp(t, 0))),
                    Value::String(status),
                    // Fee and amount require a per-signature getTransaction.
                    Value::Null,
                    Value::Null,
                ]
            })
            .collect())
    }

    async fn fetch_token_supply(&self) -> Result<Vec<Row>> {
        let fetched_at = Utc::now();
        let requests = self.config.token_mints.iter().map(|token| async move {
            let supply: WithContext<TokenAmount> = self
                .call(TableId::TokenSupply, "getTokenSupply", json!([token.mint]))
                .await?;
            Ok::<Row, QueryError>(token_row(token, supply.value, fetched_at))
        });

        try_join_all(requests).await
    }

    async fn fetch_validators(&self) -> Result<Vec<Row>> {
        let accounts: VoteAccounts = self
            .call(TableId::Validators, "getVoteAccounts", json!([]))
            .await?;

        let current = accounts.current.into_iter().map(|a| (a, false));
        let delinquent = accounts.delinquent.into_iter().map(|a| (a, true));

        Ok(current
            .chain(delinquent)
            .map(|(a, delinquent)| {
                vec![
                    Value::String(a.vote_pubkey),
                    Value::String(a.node_pubkey),
                    Value::Integer(a.activated_stake),
                    Value::Integer(a.commission),
                    Value::Integer(a.last_vote),
                    Value::Integer(a.root_slot),
                    Value::Boolean(delinquent),
                ]
            })
            .collect())
    }
}

fn token_row(token: &TokenMint, amount: TokenAmount, fetched_at: DateTime<Utc>) -> Row {
    let supply = amount.ui_amount.unwrap_or_else(|| {
        let raw = amount.amount.parse::<f64>().unwrap_or(0.0);
        raw / 10f64.powi(amount.decimals as i32)
    });
    vec![
        Value::String(token.mint.clone()),
        Value::String(token.symbol.clone()),
        Value::Float(supply),
        Value::Integer(amount.decimals),
        Value::Timestamp(fetched_at),
    ]
}

fn transport_error(table: TableId, method: &str, err: reqwest::Error) -> CallError {
    let rejected = err.status().is_some_and(|status| {
        status.is_client_error()
            && status != reqwest::StatusCode::REQUEST_TIMEOUT
            && status != reqwest::StatusCode::TOO_MANY_REQUESTS
    });
    CallError {
        retryable: !rejected && !err.is_decode(),
        error: QueryError::DataSource {
            table: table.name().to_string(),
            message: format!("{} failed: {}", method, err),
            timed_out: err.is_timeout(),
        },
    }
}

#[async_trait]
impl DataSource for RpcSource {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn fetch_rows(&self, table: TableId, _since: Option<Cursor>) -> Result<RowSet> {
        let rows = match table {
            TableId::Slots => self.fetch_slots().await?,
            TableId::Transactions => self.fetch_transactions().await?,
            TableId::TokenSupply => self.fetch_token_supply().await?,
            TableId::Validators => self.fetch_validators().await?,
        };
        Ok(RowSet::live(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> RpcConfig {
        RpcConfig {
            url: server.uri(),
            request_timeout_ms: 500,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            token_mints: vec![
                TokenMint {
                    mint: "MintA".into(),
                    symbol: "AAA".into(),
                },
                TokenMint {
                    mint: "MintB".into(),
                    symbol: "BBB".into(),
                },
            ],
            tracked_address: Some("Addr1".into()),
            ..Default::default()
        }
    }

    fn rpc_method(name: &str) -> wiremock::matchers::BodyPartialJsonMatcher {
        body_partial_json(json!({ "method": name }))
    }

    #[tokio::test]
    async fn test_slots_from_performance_samples() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(rpc_method("getRecentPerformanceSamples"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": [
                    {"slot": 300, "numTransactions": 6000, "numSlots": 150, "samplePeriodSecs": 60, "numNonVoteTransactions": 1200},
                    {"slot": 150, "numTransactions": 0, "numSlots": 150, "samplePeriodSecs": 0}
                ]
            })))
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        let rows = source.fetch_rows(TableId::Slots, None).await.unwrap();

        assert!(!rows.is_degraded());
        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[0][0], Value::Integer(300));
        assert_eq!(rows.rows[0][3], Value::Integer(6000));
        assert_eq!(rows.rows[1][4], Value::Null);
    }

    #[tokio::test]
    async fn test_token_supply_fans_out_per_mint() {
        let server = MockServer::start().await;
        for (mint, amount) in [("MintA", "5000000"), ("MintB", "250")] {
            Mock::given(method("POST"))
                .and(body_partial_json(json!({ "method": "getTokenSupply", "params": [mint] })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"context": {"slot": 1}, "value": {"amount": amount, "decimals": 2, "uiAmount": null}}
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let source = RpcSource::new(config(&server)).unwrap();
        let rows = source.fetch_rows(TableId::TokenSupply, None).await.unwrap();

        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[0][1], Value::from("AAA"));
        assert_eq!(rows.rows[0][2], Value::Float(50000.0));
        assert_eq!(rows.rows[1][2], Value::Float(2.5));
    }

    #[tokio::test]
    async fn test_validators_mark_delinquent() {
        let server = MockServer::start().await;
        let account = |vote: &str| {
            json!({"votePubkey": vote, "nodePubkey": "node", "activatedStake": 10, "commission": 5,
                   "lastVote": 100, "rootSlot": 68, "epochVoteAccount": true, "epochCredits": []})
        };
        Mock::given(method("POST"))
            .and(rpc_method("getVoteAccounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": {"current": [account("v1")], "delinquent": [account("v2")]}
            })))
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        let rows = source.fetch_rows(TableId::Validators, None).await.unwrap();

        assert_eq!(rows.rows.len(), 2);
        assert_eq!(rows.rows[0][6], Value::Boolean(false));
        assert_eq!(rows.rows[1][6], Value::Boolean(true));
    }

    #[tokio::test]
    async fn test_transaction_status_from_err() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(rpc_method("getSignaturesForAddress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": [
                    {"signature": "s1", "slot": 10, "blockTime": 1700000000, "err": null, "confirmationStatus": "finalized"},
                    {"signature": "s2", "slot": 9, "blockTime": null, "err": {"InstructionError": [0, "Custom"]}}
                ]
            })))
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        let rows = source.fetch_rows(TableId::Transactions, None).await.unwrap();

        assert_eq!(rows.rows[0][3], Value::from("finalized"));
        assert_eq!(rows.rows[1][3], Value::from("failed"));
        assert_eq!(rows.rows[1][2], Value::Null);
        assert_eq!(rows.rows[0][4], Value::Null);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": {"current": [], "delinquent": []}
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        let rows = source.fetch_rows(TableId::Validators, None).await.unwrap();
        assert!(rows.rows.is_empty());
    }

    #[tokio::test]
    async fn test_rpc_error_object_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}
            })))
            // Retry policy allows three attempts; the error object must stop it at one.
            .expect(1)
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        let err = source.fetch_rows(TableId::Slots, None).await.unwrap_err();
        match err {
            QueryError::DataSource {
                message, timed_out, ..
            } => {
                assert!(message.contains("Method not found"));
                assert!(!timed_out);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let source = RpcSource::new(config(&server)).unwrap();
        assert!(source.fetch_rows(TableId::Validators, None).await.is_err());
    }

    #[test]
    fn test_worst_case_duration_covers_all_attempts() {
        let cfg = RpcConfig {
            request_timeout_ms: 500,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                max_delay_ms: 1_000,
            },
            ..Default::default()
        };
        // 3 x 500ms plus (100 + 50) and (200 + 50) of backoff
        assert_eq!(cfg.worst_case_duration(), Duration::from_millis(1_900));
    }

    #[tokio::test]
    async fn test_request_timeout_is_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": []})),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server);
        cfg.request_timeout_ms = 50;
        cfg.retry = RetryPolicy::no_retry();
        let source = RpcSource::new(cfg).unwrap();
        let err = source.fetch_rows(TableId::Slots, None).await.unwrap_err();
        assert!(matches!(err, QueryError::DataSource { timed_out: true, .. }));
    }

    #[tokio::test]
    async fn test_transactions_require_tracked_address() {
        let server = MockServer::start().await;
        let mut cfg = config(&server);
        cfg.tracked_address = None;
        let source = RpcSource::new(cfg).unwrap();
        assert!(source
            .fetch_rows(TableId::Transactions, None)
            .await
            .is_err());
    }
}
