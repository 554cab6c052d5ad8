//! # Key Derivation
//!
//! Deterministic claim store keys. The same event always maps to the same
//! pair of keys, whichever participant observed it.

use crate::domain::value_objects::correlation_key_from_parts;
use crate::domain::{ClaimEnvelope, ClaimIdentity, ClaimRole, CorrelationKey};

/// Derive the key for `role` from the raw identity fields.
///
/// Total and pure: hashes are normalized to lowercase `0x` hex, so the
/// same event spelled with different hex casing yields the same key.
pub fn derive_key(
    role: ClaimRole,
    transaction_hash: &str,
    block_hash: &str,
    log_index: u64,
) -> CorrelationKey {
    key_for(role, &ClaimIdentity::new(transaction_hash, block_hash, log_index))
}

/// Derive the key for `role` from an identity.
pub fn key_for(role: ClaimRole, identity: &ClaimIdentity) -> CorrelationKey {
    correlation_key_from_parts(role, identity)
}

/// Source and validator keys for an envelope, in that order.
pub fn claim_keys(envelope: &ClaimEnvelope) -> (CorrelationKey, CorrelationKey) {
    let identity = envelope.identity();
    (
        key_for(ClaimRole::Source, &identity),
        key_for(ClaimRole::Validator, &identity),
    )
}
