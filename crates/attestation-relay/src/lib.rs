//! # Attestation Relay
//!
//! Event correlation and quorum aggregation between a ledger, a validation
//! network and a destination environment.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Match database change notifications to the ledger log that backs them
//! - Publish matched logs to the validation network for independent checks
//! - Collect validations per event and dispatch once quorum is reached
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | No lost validations | Per-key lock around read-modify-write |
//! | Single dispatch | Quorum check and cleanup under the same lock |
//! | No orphan tracking | Validations without a source claim are dropped |
//! | Retry on failure | Entries kept when dispatch fails |
//!
//! ## Module Structure
//!
//! ```text
//! attestation-relay/
//! ├── domain/          # Envelopes, keys, thresholds, errors
//! ├── algorithms/      # Event decoding, receipt matching, quorum
//! ├── ports/           # AttestationRelayApi, outbound clients
//! ├── adapters/        # JSON-RPC clients, in-memory store and network
//! ├── dispatcher.rs    # Destination submission
//! ├── locks.rs         # Per-key async locks
//! └── service.rs       # Ingestion and aggregation paths
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod dispatcher;
pub mod domain;
pub mod locks;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    InMemoryClaimStore, InMemoryValidationNetwork, JsonRpcDestinationClient, JsonRpcLedgerClient,
    NetworkPublisher, PublisherIdentity,
};
pub use algorithms::{
    claim_keys, decode_deposit_log, derive_key, encode_deposit_log, key_for, quorum_reached,
    ReceiptMatcher,
};
pub use dispatcher::Dispatcher;
pub use domain::{
    ChangeNotification, ClaimEnvelope, ClaimIdentity, ClaimParameters, ClaimRole, CorrelationKey,
    DispatchRecord, MessageMetadata, QuorumThreshold, RelayError, RelayResult, SourceClaim,
    ValidationRecord, VALIDATION_CHANNEL_ID,
};
pub use locks::KeyedLocks;
pub use ports::{
    AttestationRelayApi, ClaimStore, DestinationClient, DispatchAck, LedgerClient,
    MockDestinationClient, MockLedgerClient, MockPublisher, ValidationOutcome,
    ValidationPublisher,
};
pub use service::{RelayService, RelayServiceConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
