//! # Domain Errors
//!
//! Error types for the attestation relay.
//!
//! Every error here is recoverable: the caller logs it and drops the one
//! event that produced it. Nothing in the relay core retries.

use thiserror::Error;

/// Relay error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Notification or wire message is not well-formed.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Ledger reported no receipts for the referenced block.
    #[error("Block not found: block {block_number}")]
    BlockNotFound {
        /// Block number that was requested.
        block_number: u64,
    },

    /// No receipt log in the block matches the claim.
    #[error("Receipt not found: event not found in block {block_number}")]
    ReceiptNotFound {
        /// Block number that was searched.
        block_number: u64,
    },

    /// Ledger client failed for a reason other than a missing block.
    #[error("Ledger failure: {0}")]
    LedgerFailure(String),

    /// Publishing to the validation network failed.
    #[error("Publish failure: {0}")]
    PublishFailure(String),

    /// Claim store operation failed.
    #[error("Claim store failure: {0}")]
    StoreFailure(String),

    /// Submission to the destination environment failed.
    #[error("Dispatch failure for {key}: {reason}")]
    DispatchFailure {
        /// Correlation key of the claim being dispatched.
        key: String,
        /// Reason reported by the destination client.
        reason: String,
    },
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MalformedPayload(err.to_string())
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
