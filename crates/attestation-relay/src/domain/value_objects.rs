//! # Domain Value Objects
//!
//! Immutable value types for the attestation relay: claim roles, claim
//! identity, correlation keys, the quorum threshold, and the canonical
//! forms hex and amount fields are compared in.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a claim store entry plays for one ledger event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimRole {
    /// The claim this node matched and published.
    Source,
    /// Validations accumulated from the network for that claim.
    Validator,
}

impl ClaimRole {
    /// Tag used as the key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimRole::Source => "source",
            ClaimRole::Validator => "validator",
        }
    }
}

impl fmt::Display for ClaimRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a ledger event, shared by all roles.
///
/// Two claims with the same identity are the same event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClaimIdentity {
    /// Transaction hash, canonical lowercase hex.
    pub transaction_hash: String,
    /// Block hash, canonical lowercase hex.
    pub block_hash: String,
    /// Position of the log within the block.
    pub log_index: u64,
}

impl ClaimIdentity {
    /// Build an identity, normalizing both hashes.
    pub fn new(transaction_hash: &str, block_hash: &str, log_index: u64) -> Self {
        Self {
            transaction_hash: normalize_hex(transaction_hash),
            block_hash: normalize_hex(block_hash),
            log_index,
        }
    }
}

impl fmt::Display for ClaimIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.transaction_hash, self.block_hash, self.log_index
        )
    }
}

/// Claim store key: role tag plus claim identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Borrow the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<CorrelationKey> for String {
    fn from(key: CorrelationKey) -> Self {
        key.0
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn correlation_key_from_parts(role: ClaimRole, identity: &ClaimIdentity) -> CorrelationKey {
    CorrelationKey(format!("{}-{}", role.as_str(), identity))
}

/// Minimum number of validations before a claim is dispatched.
///
/// Fixed at startup, always >= 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuorumThreshold(usize);

impl QuorumThreshold {
    /// Create a threshold; `None` for zero.
    pub fn new(value: usize) -> Option<Self> {
        (value >= 1).then_some(Self(value))
    }

    /// Threshold value.
    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for QuorumThreshold {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for QuorumThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical hex form: lowercase with a `0x` prefix.
///
/// Accepts `0x`, `0X` and the database's `\x` bytea prefix, or no prefix.
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix("\\x"))
        .unwrap_or(trimmed);
    format!("0x{}", digits.to_ascii_lowercase())
}

/// Case-insensitive comparison of two hex values in canonical form.
pub fn hex_eq(a: &str, b: &str) -> bool {
    normalize_hex(a) == normalize_hex(b)
}

/// Canonical decimal form of an unsigned 256-bit amount.
///
/// Accepts decimal or `0x` hex. Returns `None` for anything else
/// (negative, fractional, exponent notation, overflow).
pub fn normalize_amount(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) if !hex_digits.is_empty() => U256::from_str_radix(hex_digits, 16).ok()?,
        Some(_) => return None,
        None => {
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            U256::from_dec_str(trimmed).ok()?
        }
    };
    Some(parsed.to_string())
}
