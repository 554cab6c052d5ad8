//! Validation Network Adapter
//!
//! In-process pub/sub for validation messages, one broadcast channel per
//! stream, plus a `ValidationPublisher` that stamps outgoing envelopes with
//! this node's identity.
//!
//! Suitable for single-node operation and tests. The runtime bridges the
//! streams to the external network through its feed.

use crate::algorithms::keccak256;
use crate::domain::{
    ClaimEnvelope, MessageMetadata, RelayError, RelayResult, SourceClaim, ValidationRecord,
};
use crate::ports::outbound::ValidationPublisher;
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::debug;

/// Messages buffered per subscriber before it lags.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Identity a participant publishes under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublisherIdentity {
    address: String,
}

impl PublisherIdentity {
    /// Derive the Ethereum address of a hex secp256k1 private key.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the key is not 32 bytes of hex or not a valid
    /// scalar.
    pub fn from_private_key(private_key_hex: &str) -> RelayResult<Self> {
        let trimmed = private_key_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| RelayError::MalformedPayload(format!("private key: {}", e)))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| RelayError::MalformedPayload("private key: invalid scalar".to_string()))?;

        let encoded = signing_key.verifying_key().to_encoded_point(false);
        // Keccak256 of the public key without the 0x04 prefix
        let hash = keccak256(&encoded.as_bytes()[1..]);

        Ok(Self {
            address: format!("0x{}", hex::encode(&hash[12..])),
        })
    }

    /// Fixed identity, for tests and tools.
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Publisher address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// In-process validation network.
pub struct InMemoryValidationNetwork {
    streams: RwLock<HashMap<String, broadcast::Sender<ValidationRecord>>>,
    capacity: usize,
}

impl InMemoryValidationNetwork {
    /// Create a network with default per-stream capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STREAM_CAPACITY)
    }

    /// Create a network with the given per-stream capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    fn sender(&self, stream_id: &str) -> broadcast::Sender<ValidationRecord> {
        if let Some(sender) = self.streams.read().get(stream_id) {
            return sender.clone();
        }
        self.streams
            .write()
            .entry(stream_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a stream.
    pub fn subscribe(&self, stream_id: &str) -> broadcast::Receiver<ValidationRecord> {
        debug!("[relay] New subscription on stream {}", stream_id);
        self.sender(stream_id).subscribe()
    }

    /// Deliver a message to every subscriber of `stream_id`.
    ///
    /// Returns the number of subscribers reached.
    pub fn deliver(&self, stream_id: &str, record: ValidationRecord) -> usize {
        self.sender(stream_id).send(record).unwrap_or(0)
    }

    /// Active subscribers on a stream.
    pub fn subscriber_count(&self, stream_id: &str) -> usize {
        self.streams
            .read()
            .get(stream_id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl Default for InMemoryValidationNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes envelopes to one stream of the network.
pub struct NetworkPublisher {
    network: Arc<InMemoryValidationNetwork>,
    stream_id: String,
    identity: PublisherIdentity,
    sequence: AtomicU64,
}

impl NetworkPublisher {
    /// Create a publisher for `stream_id`.
    pub fn new(
        network: Arc<InMemoryValidationNetwork>,
        stream_id: impl Into<String>,
        identity: PublisherIdentity,
    ) -> Self {
        Self {
            network,
            stream_id: stream_id.into(),
            identity,
            sequence: AtomicU64::new(0),
        }
    }

    /// Stream this publisher writes to.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl ValidationPublisher for NetworkPublisher {
    async fn publish(&self, envelope: &ClaimEnvelope) -> RelayResult<SourceClaim> {
        let metadata = MessageMetadata {
            stream_id: self.stream_id.clone(),
            publisher_id: self.identity.address().to_string(),
            timestamp: now_millis(),
            sequence_number: self.sequence.fetch_add(1, Ordering::SeqCst),
        };

        let reached = self.network.deliver(
            &self.stream_id,
            ValidationRecord {
                content: envelope.clone(),
                metadata: metadata.clone(),
            },
        );
        debug!(
            "[relay] Published {} to {} ({} subscribers)",
            envelope.identity(),
            self.stream_id,
            reached
        );

        Ok(SourceClaim {
            content: envelope.clone(),
            metadata,
        })
    }
}
