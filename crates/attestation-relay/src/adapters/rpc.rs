//! JSON-RPC transport shared by the ledger and destination adapters.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Default request timeout.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Request could not be sent or the response body not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Remote {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },
}

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcTransport {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Create a transport with the default timeout.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self::with_timeout(rpc_url, Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS))
    }

    /// Create a transport with a custom timeout.
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    /// Make a JSON-RPC call. A `null` result is returned as `None`.
    pub async fn call<P: Serialize + Send, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Option<R>, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response: JsonRpcResponse<R> = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16).ok()
}
