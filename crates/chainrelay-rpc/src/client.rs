//! `NodeClient` trait and the HTTP JSON-RPC implementation.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use chainrelay_core::fork::ChainHashes;
use chainrelay_core::ExtractorError;

use crate::error::RpcError;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::types::{BlockWithReceipts, RawBlock, RawReceipt};

/// The node-RPC collaborator consumed by the iterator, the fork detector,
/// and the orchestrator.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current head block number.
    async fn head_number(&self) -> Result<u64, RpcError>;

    /// Full block at `number` with transactions and per-transaction
    /// receipts, in transaction order. `None` if the node has no block
    /// there yet.
    async fn block_with_receipts(&self, number: u64)
        -> Result<Option<BlockWithReceipts>, RpcError>;

    /// Canonical block hash at `number`, or `None` if absent.
    async fn block_hash(&self, number: u64) -> Result<Option<B256>, RpcError>;

    /// Node-reported transaction count for the block with the given hash.
    async fn transaction_count_by_hash(&self, hash: B256) -> Result<usize, RpcError>;
}

/// Adapter exposing a [`NodeClient`] as the fork detector's hash source.
pub struct NodeHashes(pub Arc<dyn NodeClient>);

#[async_trait]
impl ChainHashes for NodeHashes {
    async fn hash_at(&self, number: u64) -> Result<Option<B256>, ExtractorError> {
        Ok(self.0.block_hash(number).await?)
    }
}

/// Configuration for [`HttpNodeClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC over HTTP with retry/backoff for transport failures.
pub struct HttpNodeClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpNodeClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::new(url, HttpClientConfig::default())
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(RpcError::Transport(format!("HTTP {status}")));
        }

        let parsed: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// Send a request, retrying transient transport failures with backoff.
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                method,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "transient RPC failure, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(RpcError::RetriesExhausted {
                                attempts: attempt,
                                last: err.to_string(),
                            });
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn expect_quantity(method: &str, value: &Value) -> Result<u64, RpcError> {
        value
            .as_str()
            .and_then(crate::types::hex_u64::parse)
            .ok_or_else(|| RpcError::Malformed {
                method: method.into(),
                reason: format!("expected hex quantity, got {value}"),
            })
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn head_number(&self) -> Result<u64, RpcError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        Self::expect_quantity("eth_blockNumber", &result)
    }

    async fn block_with_receipts(
        &self,
        number: u64,
    ) -> Result<Option<BlockWithReceipts>, RpcError> {
        let result = self
            .call("eth_getBlockByNumber", json!([format!("{number:#x}"), true]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let block: RawBlock =
            serde_json::from_value(result).map_err(|e| RpcError::Malformed {
                method: "eth_getBlockByNumber".into(),
                reason: e.to_string(),
            })?;

        let mut receipts = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let result = self
                .call(
                    "eth_getTransactionReceipt",
                    json!([format!("{:#x}", tx.hash)]),
                )
                .await?;
            if result.is_null() {
                return Err(RpcError::Malformed {
                    method: "eth_getTransactionReceipt".into(),
                    reason: format!("no receipt for mined transaction {:#x}", tx.hash),
                });
            }
            let receipt: RawReceipt =
                serde_json::from_value(result).map_err(|e| RpcError::Malformed {
                    method: "eth_getTransactionReceipt".into(),
                    reason: e.to_string(),
                })?;
            receipts.push(receipt);
        }

        Ok(Some(BlockWithReceipts { block, receipts }))
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, RpcError> {
        let result = self
            .call("eth_getBlockByNumber", json!([format!("{number:#x}"), false]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let hash = result
            .get("hash")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<B256>().ok())
            .ok_or_else(|| RpcError::Malformed {
                method: "eth_getBlockByNumber".into(),
                reason: "missing or invalid block hash".into(),
            })?;
        Ok(Some(hash))
    }

    async fn transaction_count_by_hash(&self, hash: B256) -> Result<usize, RpcError> {
        let result = self
            .call(
                "eth_getBlockTransactionCountByHash",
                json!([format!("{hash:#x}")]),
            )
            .await?;
        Self::expect_quantity("eth_getBlockTransactionCountByHash", &result).map(|n| n as usize)
    }
}
