//! # Domain Entities
//!
//! Wire shapes exchanged with the validation network and the destination,
//! the ledger receipt shape the matcher filters, and the decoded
//! change-notification payload.

use super::errors::{RelayError, RelayResult};
use super::value_objects::{normalize_amount, normalize_hex, ClaimIdentity};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// Channel identifier stamped on every envelope this relay produces.
pub const VALIDATION_CHANNEL_ID: &str = "evm-validate";

/// Validation-claim envelope.
///
/// This is the wire shape every validating participant publishes; field
/// names must stay stable for interoperability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimEnvelope {
    /// Chain the event was observed on.
    #[serde(alias = "__logStoreChainId")]
    pub chain_id: String,
    /// Validation channel identifier.
    #[serde(alias = "__logStoreChannelId")]
    pub channel_id: String,
    /// Contract that emitted the log.
    pub address: String,
    /// Block containing the log.
    pub block_hash: String,
    /// Raw log data.
    pub data: String,
    /// Log position within the block.
    pub log_index: u64,
    /// Raw log topics.
    pub topics: Vec<String>,
    /// Transaction that emitted the log.
    pub transaction_hash: String,
}

impl ClaimEnvelope {
    /// Identity shared by the source and validator entries.
    pub fn identity(&self) -> ClaimIdentity {
        ClaimIdentity::new(&self.transaction_hash, &self.block_hash, self.log_index)
    }
}

/// Metadata the pub/sub network attaches to a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Stream the message was published on.
    pub stream_id: String,
    /// Address of the publishing participant.
    pub publisher_id: String,
    /// Publish time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Per-publisher sequence number.
    #[serde(default)]
    pub sequence_number: u64,
}

/// A matched claim as acknowledged by the validation network.
///
/// Stored under the "source" role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceClaim {
    /// Published envelope.
    pub content: ClaimEnvelope,
    /// Network acknowledgement metadata.
    pub metadata: MessageMetadata,
}

/// One participant's corroboration of a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Corroborated envelope.
    pub content: ClaimEnvelope,
    /// Message metadata (origin, timestamp).
    pub metadata: MessageMetadata,
}

/// Combined record forwarded to the destination once quorum is reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Stored source claim.
    pub source: SourceClaim,
    /// Validations, most recent first.
    pub validation: Vec<ValidationRecord>,
}

/// Raw change notification from the database listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// JSON-encoded row payload.
    pub payload: String,
}

/// Raw log fields as carried by a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// ABI-encoded non-indexed parameters.
    pub data: String,
    /// Event signature topic followed by indexed parameters.
    pub topics: Vec<String>,
}

/// One log entry within a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    /// Emitting contract.
    pub address: String,
    /// Block containing the log.
    pub block_hash: String,
    /// Raw log payload.
    pub raw: RawLog,
    /// Log position within the block.
    pub log_index: u64,
    /// Transaction that emitted the log.
    pub transaction_hash: String,
}

/// Transaction receipt supplied by the ledger client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Destination address; `None` for contract creation.
    pub to: Option<String>,
    /// Logs in emission order.
    pub logs: Vec<ReceiptLog>,
}

/// Watched parameters of a claim, decoded from a notification payload.
///
/// Hex fields are in canonical form and `amount` is canonical decimal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimParameters {
    /// Block the event was indexed in.
    pub block_number: u64,
    /// Depositing account.
    pub account: String,
    /// Destination canister identifier.
    pub canister_id: String,
    /// Amount in canonical decimal form.
    pub amount: String,
    /// Destination chain.
    pub chain: String,
    /// Token address.
    pub token: String,
}

/// Parameters of a watched deposit event, decoded from a receipt log.
///
/// Hex fields are in canonical form and `amount` is canonical decimal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositEvent {
    /// Depositing account.
    pub account: String,
    /// Token address.
    pub token: String,
    /// Destination canister identifier.
    pub canister_id: String,
    /// Amount in canonical decimal form.
    pub amount: String,
    /// Destination chain.
    pub chain: String,
}

#[derive(Deserialize)]
struct RawEventPayload {
    #[serde(rename = "block$")]
    block: Value,
    account: String,
    canister_id: String,
    amount: Box<RawValue>,
    chain: Value,
    token: String,
}

impl ClaimParameters {
    /// Decode and normalize a notification payload.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the payload is not JSON, lacks a field, or
    /// carries a block number or amount that is not an unsigned integer.
    pub fn from_payload(payload: &str) -> RelayResult<Self> {
        let raw: RawEventPayload = serde_json::from_str(payload)?;

        let block_number = parse_block_number(&raw.block).ok_or_else(|| {
            RelayError::MalformedPayload(format!("invalid block reference: {}", raw.block))
        })?;

        let amount = raw_scalar_text(&raw.amount)
            .as_deref()
            .and_then(normalize_amount)
            .ok_or_else(|| {
                RelayError::MalformedPayload(format!("invalid amount: {}", raw.amount))
            })?;

        let chain = scalar_to_string(&raw.chain).ok_or_else(|| {
            RelayError::MalformedPayload(format!("invalid chain: {}", raw.chain))
        })?;

        Ok(Self {
            block_number,
            account: normalize_hex(&raw.account),
            canister_id: raw.canister_id.trim().to_string(),
            amount,
            chain,
            token: normalize_hex(&raw.token),
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Literal text of a string or number, without going through `f64`.
fn raw_scalar_text(raw: &RawValue) -> Option<String> {
    let text = raw.get().trim();
    match text.chars().next()? {
        '"' => serde_json::from_str::<String>(text)
            .ok()
            .map(|s| s.trim().to_string()),
        '-' | '0'..='9' => Some(text.to_string()),
        _ => None,
    }
}

fn parse_block_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex_digits) => u64::from_str_radix(hex_digits, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> ClaimEnvelope {
        ClaimEnvelope {
            chain_id: "1".to_string(),
            channel_id: VALIDATION_CHANNEL_ID.to_string(),
            address: "0xcontract".to_string(),
            block_hash: "0xB1".to_string(),
            data: "0x".to_string(),
            log_index: 2,
            topics: vec!["0xtopic".to_string()],
            transaction_hash: "0xT1".to_string(),
        }
    }

    #[test]
    fn test_envelope_wire_field_names() {
        let json = serde_json::to_value(sample_envelope()).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "address",
                "blockHash",
                "chainId",
                "channelId",
                "data",
                "logIndex",
                "topics",
                "transactionHash"
            ]
        );
        assert_eq!(obj["logIndex"], 2);
    }

    #[test]
    fn test_envelope_accepts_legacy_field_names() {
        let json = r#"{
            "__logStoreChainId": "1",
            "__logStoreChannelId": "evm-validate",
            "address": "0xcontract",
            "blockHash": "0xB1",
            "data": "0x",
            "logIndex": 2,
            "topics": ["0xtopic"],
            "transactionHash": "0xT1"
        }"#;
        let envelope: ClaimEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope, sample_envelope());
    }

    #[test]
    fn test_envelope_identity_ignores_hex_case() {
        let mut upper = sample_envelope();
        upper.transaction_hash = "0XT1".to_string();
        assert_eq!(upper.identity(), sample_envelope().identity());
    }

    #[test]
    fn test_parameters_from_payload() {
        let payload = r#"{
            "block$": 120,
            "id": 7,
            "account": "\\xABCDEF",
            "canister_id": "ryjl3-tyaaa-aaaaa-aaaba-cai",
            "amount": "0001000",
            "chain": "ethereum",
            "token": "0xDEADbeef"
        }"#;
        let params = ClaimParameters::from_payload(payload).unwrap();
        assert_eq!(params.block_number, 120);
        assert_eq!(params.account, "0xabcdef");
        assert_eq!(params.amount, "1000");
        assert_eq!(params.chain, "ethereum");
        assert_eq!(params.token, "0xdeadbeef");
    }

    #[test]
    fn test_parameters_numeric_amount_and_string_block() {
        let payload = r#"{
            "block$": "0x78",
            "account": "0x01",
            "canister_id": "c",
            "amount": 5000,
            "chain": 1,
            "token": "0x02"
        }"#;
        let params = ClaimParameters::from_payload(payload).unwrap();
        assert_eq!(params.block_number, 120);
        assert_eq!(params.amount, "5000");
        assert_eq!(params.chain, "1");
    }

    #[test]
    fn test_parameters_amount_beyond_u64() {
        let payload = r#"{"block$":1,"account":"0x01","canister_id":"c","amount":100000000000000000000,"chain":"x","token":"0x02"}"#;
        let params = ClaimParameters::from_payload(payload).unwrap();
        assert_eq!(params.amount, "100000000000000000000");

        let payload = r#"{"block$":1,"account":"0x01","canister_id":"c","amount":115792089237316195423570985008687907853269984665640564039457584007913129639935,"chain":"x","token":"0x02"}"#;
        let params = ClaimParameters::from_payload(payload).unwrap();
        assert_eq!(params.amount, primitive_types::U256::MAX.to_string());
    }

    #[test]
    fn test_parameters_rejects_fractional_and_exponent_amounts() {
        for amount in ["1.5", "1e20", "true", "null"] {
            let payload = format!(
                r#"{{"block$":1,"account":"0x01","canister_id":"c","amount":{},"chain":"x","token":"0x02"}}"#,
                amount
            );
            let err = ClaimParameters::from_payload(&payload).unwrap_err();
            assert!(matches!(err, RelayError::MalformedPayload(_)), "{amount}");
        }
    }

    #[test]
    fn test_parameters_not_json() {
        let err = ClaimParameters::from_payload("not json").unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
    }

    #[test]
    fn test_parameters_missing_field() {
        let err = ClaimParameters::from_payload(r#"{"block$": 1}"#).unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
    }

    #[test]
    fn test_parameters_bad_amount() {
        let payload = r#"{
            "block$": 1, "account": "0x01", "canister_id": "c",
            "amount": "-3", "chain": "x", "token": "0x02"
        }"#;
        let err = ClaimParameters::from_payload(payload).unwrap_err();
        assert!(err.to_string().contains("invalid amount"));
    }
}
