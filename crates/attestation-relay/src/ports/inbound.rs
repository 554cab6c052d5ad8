//! # Inbound Ports
//!
//! API trait defining what the attestation relay can do.

use crate::domain::{ChangeNotification, CorrelationKey, RelayResult, SourceClaim, ValidationRecord};
use async_trait::async_trait;

/// Result of handling one validation message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// No source claim is tracked for this event; message discarded.
    Orphan {
        /// Source key that was looked up.
        key: CorrelationKey,
    },
    /// Validation recorded, quorum not yet reached.
    Pending {
        /// Validations accumulated so far.
        count: usize,
        /// Configured threshold.
        threshold: usize,
    },
    /// Quorum reached and the combined record was dispatched.
    Dispatched {
        /// Validations included in the dispatched record.
        count: usize,
        /// Whether both claim store entries were removed afterwards.
        cleaned: bool,
    },
}

/// Attestation relay API - inbound port.
///
/// Both paths may be invoked concurrently; the implementation serializes
/// work per correlation key.
#[async_trait]
pub trait AttestationRelayApi: Send + Sync {
    /// Source ingestion path: match a change notification to a ledger log,
    /// publish it to the validation network and track it.
    async fn ingest_notification(
        &self,
        notification: ChangeNotification,
    ) -> RelayResult<SourceClaim>;

    /// Validation aggregation path: record a validation and dispatch the
    /// claim once quorum is reached.
    async fn handle_validation(&self, record: ValidationRecord) -> RelayResult<ValidationOutcome>;
}
