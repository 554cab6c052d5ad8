//! # Outbound Ports
//!
//! Traits for the relay's external collaborators: the ledger, the
//! validation network, the claim cache and the destination environment.

use crate::domain::{
    ClaimEnvelope, CorrelationKey, MessageMetadata, RelayError, RelayResult, SourceClaim,
    TransactionReceipt,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ledger client - outbound port.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Receipts of every transaction in a block.
    ///
    /// # Errors
    ///
    /// `BlockNotFound` when the ledger has no rows for `block_number`.
    async fn get_block_receipts(&self, block_number: u64) -> RelayResult<Vec<TransactionReceipt>>;
}

/// Validation network publisher - outbound port.
#[async_trait]
pub trait ValidationPublisher: Send + Sync {
    /// Publish an envelope; returns the network's acknowledged form.
    async fn publish(&self, envelope: &ClaimEnvelope) -> RelayResult<SourceClaim>;
}

/// Claim cache - outbound port.
///
/// Values are JSON documents. No compare-and-swap is offered; callers
/// serialize read-modify-write per key.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &CorrelationKey) -> RelayResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &CorrelationKey, value: String) -> RelayResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &CorrelationKey) -> RelayResult<()>;
}

/// Acknowledgement returned by the destination environment.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchAck {
    /// Raw response body.
    pub response: Value,
}

/// Destination environment client - outbound port.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Submit a JSON-encoded dispatch record.
    async fn process_event(&self, payload: String) -> RelayResult<DispatchAck>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock ledger client for testing.
#[derive(Default)]
pub struct MockLedgerClient {
    /// Receipts per block number.
    pub blocks: HashMap<u64, Vec<TransactionReceipt>>,
    /// Should fail?
    pub should_fail: bool,
}

impl MockLedgerClient {
    /// Serve `receipts` for `block_number`.
    pub fn with_block(mut self, block_number: u64, receipts: Vec<TransactionReceipt>) -> Self {
        self.blocks.insert(block_number, receipts);
        self
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn get_block_receipts(&self, block_number: u64) -> RelayResult<Vec<TransactionReceipt>> {
        if self.should_fail {
            return Err(RelayError::LedgerFailure("Mock failure".to_string()));
        }

        match self.blocks.get(&block_number) {
            Some(receipts) if !receipts.is_empty() => Ok(receipts.clone()),
            _ => Err(RelayError::BlockNotFound { block_number }),
        }
    }
}

/// Mock publisher that acknowledges with fixed metadata.
#[derive(Default)]
pub struct MockPublisher {
    /// Envelopes published so far.
    pub published: Mutex<Vec<ClaimEnvelope>>,
    /// Should fail?
    pub should_fail: bool,
}

#[async_trait]
impl ValidationPublisher for MockPublisher {
    async fn publish(&self, envelope: &ClaimEnvelope) -> RelayResult<SourceClaim> {
        if self.should_fail {
            return Err(RelayError::PublishFailure("Mock failure".to_string()));
        }

        let mut published = self.published.lock();
        published.push(envelope.clone());
        Ok(SourceClaim {
            content: envelope.clone(),
            metadata: MessageMetadata {
                stream_id: "mock/stream".to_string(),
                publisher_id: "0xmock".to_string(),
                timestamp: 1_700_000_000_000,
                sequence_number: published.len() as u64 - 1,
            },
        })
    }
}

/// Mock destination that records every payload.
#[derive(Default)]
pub struct MockDestinationClient {
    /// Payloads received so far.
    pub payloads: Mutex<Vec<String>>,
    /// Number of upcoming calls that fail.
    pub failures_remaining: AtomicU64,
}

impl MockDestinationClient {
    /// Fail the next `count` calls.
    pub fn failing(count: u64) -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            failures_remaining: AtomicU64::new(count),
        }
    }

    /// Number of successful dispatches.
    pub fn dispatch_count(&self) -> usize {
        self.payloads.lock().len()
    }
}

#[async_trait]
impl DestinationClient for MockDestinationClient {
    async fn process_event(&self, payload: String) -> RelayResult<DispatchAck> {
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RelayError::DispatchFailure {
                key: String::new(),
                reason: "Mock failure".to_string(),
            });
        }

        self.payloads.lock().push(payload);
        Ok(DispatchAck {
            response: Value::Bool(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VALIDATION_CHANNEL_ID;

    fn envelope() -> ClaimEnvelope {
        ClaimEnvelope {
            chain_id: "1".to_string(),
            channel_id: VALIDATION_CHANNEL_ID.to_string(),
            address: "0xc".to_string(),
            block_hash: "0xb1".to_string(),
            data: "0x".to_string(),
            log_index: 0,
            topics: vec![],
            transaction_hash: "0xt1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_ledger_missing_block() {
        let client = MockLedgerClient::default();
        let err = client.get_block_receipts(5).await.unwrap_err();
        assert!(matches!(err, RelayError::BlockNotFound { block_number: 5 }));
    }

    #[tokio::test]
    async fn test_mock_ledger_empty_block_is_not_found() {
        let client = MockLedgerClient::default().with_block(5, vec![]);
        assert!(client.get_block_receipts(5).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_ledger_failure() {
        let client = MockLedgerClient {
            should_fail: true,
            ..Default::default()
        };
        let err = client.get_block_receipts(5).await.unwrap_err();
        assert!(matches!(err, RelayError::LedgerFailure(_)));
    }

    #[tokio::test]
    async fn test_mock_publisher_sequences() {
        let publisher = MockPublisher::default();
        let first = publisher.publish(&envelope()).await.unwrap();
        let second = publisher.publish(&envelope()).await.unwrap();
        assert_eq!(first.metadata.sequence_number, 0);
        assert_eq!(second.metadata.sequence_number, 1);
        assert_eq!(first.content, envelope());
    }

    #[tokio::test]
    async fn test_mock_destination_fails_then_succeeds() {
        let destination = MockDestinationClient::failing(1);
        assert!(destination.process_event("a".to_string()).await.is_err());
        assert!(destination.process_event("b".to_string()).await.is_ok());
        assert_eq!(destination.dispatch_count(), 1);
    }
}
