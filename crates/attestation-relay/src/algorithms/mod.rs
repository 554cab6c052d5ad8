//! # Algorithms Module
//!
//! Pure logic for the relay: key derivation, event decoding, receipt
//! matching and the quorum decision.

pub mod decoder;
pub mod key;
pub mod matcher;
pub mod quorum;

pub use decoder::{
    decode_deposit_log, deposit_event_topic, encode_deposit_log, keccak256,
    DEPOSIT_EVENT_SIGNATURE,
};
pub use key::{claim_keys, derive_key, key_for};
pub use matcher::ReceiptMatcher;
pub use quorum::quorum_reached;
