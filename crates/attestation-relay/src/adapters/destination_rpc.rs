//! Destination Client Adapter
//!
//! Implements `DestinationClient` by calling `process_event` on the
//! destination's JSON-RPC endpoint with the dispatch record as its single
//! string argument.

use super::rpc::JsonRpcTransport;
use crate::domain::{RelayError, RelayResult};
use crate::ports::outbound::{DestinationClient, DispatchAck};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Method invoked on the destination.
pub const PROCESS_EVENT_METHOD: &str = "process_event";

/// JSON-RPC destination client.
pub struct JsonRpcDestinationClient {
    transport: JsonRpcTransport,
}

impl JsonRpcDestinationClient {
    /// Create a client for `rpc_url`.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            transport: JsonRpcTransport::new(rpc_url),
        }
    }
}

#[async_trait]
impl DestinationClient for JsonRpcDestinationClient {
    async fn process_event(&self, payload: String) -> RelayResult<DispatchAck> {
        debug!(
            "[relay] Submitting {} bytes to {}",
            payload.len(),
            self.transport.url()
        );

        let response: Option<Value> = self
            .transport
            .call(PROCESS_EVENT_METHOD, [payload])
            .await
            .map_err(|e| RelayError::DispatchFailure {
                key: String::new(),
                reason: e.to_string(),
            })?;

        Ok(DispatchAck {
            response: response.unwrap_or(Value::Null),
        })
    }
}
