//! # Dispatcher
//!
//! Forwards a corroborated claim to the destination environment. Cleanup
//! of the claim store is the caller's job and happens only after this
//! returns `Ok`.

use crate::domain::{CorrelationKey, DispatchRecord, RelayError, RelayResult};
use crate::ports::outbound::{DestinationClient, DispatchAck};
use std::sync::Arc;
use tracing::info;

/// Serializes dispatch records and submits them.
pub struct Dispatcher<D: DestinationClient> {
    destination: Arc<D>,
}

impl<D: DestinationClient> Dispatcher<D> {
    /// Create a dispatcher over `destination`.
    pub fn new(destination: Arc<D>) -> Self {
        Self { destination }
    }

    /// Submit `record` as a single JSON string argument.
    ///
    /// # Errors
    ///
    /// Any failure is reported as `DispatchFailure` tagged with `key`.
    pub async fn dispatch(
        &self,
        key: &CorrelationKey,
        record: &DispatchRecord,
    ) -> RelayResult<DispatchAck> {
        let payload = serde_json::to_string(record)?;

        let ack = self
            .destination
            .process_event(payload)
            .await
            .map_err(|e| RelayError::DispatchFailure {
                key: key.to_string(),
                reason: match e {
                    RelayError::DispatchFailure { reason, .. } => reason,
                    other => other.to_string(),
                },
            })?;

        info!(
            "[relay] Event:{} dispatched with {} validations",
            key,
            record.validation.len()
        );
        Ok(ack)
    }
}
