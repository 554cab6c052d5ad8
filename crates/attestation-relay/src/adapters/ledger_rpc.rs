//! Ledger Client Adapter
//!
//! Implements `LedgerClient` over Ethereum JSON-RPC (`eth_getBlockReceipts`).

use super::rpc::{parse_hex_u64, JsonRpcTransport};
use crate::domain::{RawLog, ReceiptLog, RelayError, RelayResult, TransactionReceipt};
use crate::ports::outbound::LedgerClient;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Receipt as returned by an Ethereum node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    to: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

/// Log as returned by an Ethereum node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    block_hash: String,
    data: String,
    #[serde(default)]
    topics: Vec<String>,
    log_index: String,
    transaction_hash: String,
}

impl RpcReceipt {
    fn into_domain(self) -> RelayResult<TransactionReceipt> {
        let logs = self
            .logs
            .into_iter()
            .map(|log| {
                let log_index = parse_hex_u64(&log.log_index).ok_or_else(|| {
                    RelayError::LedgerFailure(format!("invalid logIndex {}", log.log_index))
                })?;
                Ok(ReceiptLog {
                    address: log.address,
                    block_hash: log.block_hash,
                    raw: RawLog {
                        data: log.data,
                        topics: log.topics,
                    },
                    log_index,
                    transaction_hash: log.transaction_hash,
                })
            })
            .collect::<RelayResult<Vec<_>>>()?;

        Ok(TransactionReceipt { to: self.to, logs })
    }
}

/// JSON-RPC ledger client.
pub struct JsonRpcLedgerClient {
    transport: JsonRpcTransport,
}

impl JsonRpcLedgerClient {
    /// Create a client for `rpc_url`.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            transport: JsonRpcTransport::new(rpc_url),
        }
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn get_block_receipts(&self, block_number: u64) -> RelayResult<Vec<TransactionReceipt>> {
        debug!("[relay] Fetching receipts for block {}", block_number);

        let receipts: Option<Vec<RpcReceipt>> = self
            .transport
            .call("eth_getBlockReceipts", [format!("0x{:x}", block_number)])
            .await
            .map_err(|e| RelayError::LedgerFailure(e.to_string()))?;

        let receipts = receipts.unwrap_or_default();
        if receipts.is_empty() {
            return Err(RelayError::BlockNotFound { block_number });
        }

        receipts.into_iter().map(RpcReceipt::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT_JSON: &str = r#"{
        "to": "0x1111111111111111111111111111111111111111",
        "status": "0x1",
        "logs": [{
            "address": "0x1111111111111111111111111111111111111111",
            "blockHash": "0xb1",
            "blockNumber": "0x78",
            "data": "0x00",
            "topics": ["0xaa", "0xbb"],
            "logIndex": "0x2",
            "transactionHash": "0xt1",
            "removed": false
        }]
    }"#;

    #[test]
    fn test_rpc_receipt_into_domain() {
        let rpc: RpcReceipt = serde_json::from_str(RECEIPT_JSON).unwrap();
        let receipt = rpc.into_domain().unwrap();

        assert_eq!(receipt.to.as_deref(), Some("0x1111111111111111111111111111111111111111"));
        assert_eq!(receipt.logs.len(), 1);
        let log = &receipt.logs[0];
        assert_eq!(log.log_index, 2);
        assert_eq!(log.raw.topics, vec!["0xaa", "0xbb"]);
        assert_eq!(log.raw.data, "0x00");
        assert_eq!(log.transaction_hash, "0xt1");
    }

    #[test]
    fn test_contract_creation_receipt() {
        let rpc: RpcReceipt = serde_json::from_str(r#"{"to": null, "logs": []}"#).unwrap();
        let receipt = rpc.into_domain().unwrap();
        assert!(receipt.to.is_none());
    }

    #[test]
    fn test_bad_log_index_rejected() {
        let json = RECEIPT_JSON.replace("\"0x2\"", "\"two\"");
        let rpc: RpcReceipt = serde_json::from_str(&json).unwrap();
        assert!(matches!(rpc.into_domain(), Err(RelayError::LedgerFailure(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_ledger_failure() {
        let client = JsonRpcLedgerClient::new("http://127.0.0.1:1");
        let err = client.get_block_receipts(1).await.unwrap_err();
        assert!(matches!(err, RelayError::LedgerFailure(_)));
    }
}
