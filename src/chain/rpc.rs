//! JSON-RPC chain reads
//!
//! All on-chain access goes through [`ChainReader::call`], a read-only
//! `eth_call` against the latest block. The HTTP implementation applies a
//! bounded timeout and a small fixed retry budget; reverts are never retried
//! since they are deterministic for the same block.

use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::address::Address;

/// Errors from a chain read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ChainError {
    /// Timeouts and transport failures may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Timeout | ChainError::Transport(_))
    }
}

/// Read-only access to contract state
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute `eth_call` against `to` and return the raw return data.
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError>;
}

/// RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Per-attempt timeout (default: 12 seconds)
    pub timeout: Duration,
    /// Additional attempts after a retryable failure (default: 1)
    pub retries: u32,
    /// Fixed delay between attempts (default: 500 ms)
    pub backoff: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://mainnet.base.org".to_string(),
            timeout: Duration::from_secs(12),
            retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// `eth_call` over HTTP JSON-RPC
pub struct JsonRpcClient {
    config: RpcConfig,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(config: RpcConfig) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("engage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call_once(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
                "latest"
            ]
        });

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout
                } else {
                    ChainError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::Transport(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ChainError::InvalidResponse(format!("HTTP {status}")));
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::Timeout
            } else {
                ChainError::InvalidResponse(e.to_string())
            }
        })?;

        parse_rpc_response(parsed)
    }
}

fn parse_rpc_response(response: RpcResponse) -> Result<Vec<u8>, ChainError> {
    if let Some(err) = response.error {
        return Err(classify_rpc_error(err));
    }

    let result = response
        .result
        .ok_or_else(|| ChainError::InvalidResponse("missing result".to_string()))?;
    let digits = result.strip_prefix("0x").unwrap_or(&result);
    hex::decode(digits).map_err(|e| ChainError::InvalidResponse(e.to_string()))
}

fn classify_rpc_error(err: RpcErrorBody) -> ChainError {
    // Geth reports reverts as code 3; other nodes use -32000 with a message
    let reverted = err.code == 3 || err.message.to_ascii_lowercase().contains("revert");
    if reverted {
        let detail = err
            .data
            .as_ref()
            .and_then(|d| d.as_str())
            .map(|d| d.to_string())
            .unwrap_or(err.message);
        ChainError::Reverted(detail)
    } else {
        ChainError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

#[async_trait::async_trait]
impl ChainReader for JsonRpcClient {
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let mut attempt = 0;
        loop {
            match self.call_once(to, data).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(to = %to, attempt, error = %e, "eth_call failed, retrying");
                    tokio::time::sleep(self.config.backoff).await;
                }
                Err(e) => {
                    debug!(to = %to, error = %e, "eth_call failed");
                    return Err(e);
                }
            }
        }
    }
}
