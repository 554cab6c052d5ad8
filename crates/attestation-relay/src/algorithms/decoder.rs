//! # Deposit Event Codec
//!
//! ABI codec for the watched contract's deposit event:
//!
//! ```text
//! FundsDeposited(address indexed account, address indexed token,
//!                string canisterId, uint256 amount, string chain)
//!
//! topics[0] = keccak256(signature)
//! topics[1] = account (left-padded to 32 bytes)
//! topics[2] = token   (left-padded to 32 bytes)
//! data      = abi.encode(canisterId, amount, chain)
//! ```

use crate::domain::{normalize_amount, normalize_hex, DepositEvent, RawLog};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

/// Canonical signature of the watched event.
pub const DEPOSIT_EVENT_SIGNATURE: &str =
    "FundsDeposited(address,address,string,uint256,string)";

const WORD: usize = 32;

/// Keccak-256 hash.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Topic 0 of the deposit event, as canonical hex.
pub fn deposit_event_topic() -> String {
    format!("0x{}", hex::encode(keccak256(DEPOSIT_EVENT_SIGNATURE.as_bytes())))
}

/// Decode a raw log as a deposit event.
///
/// Returns `None` for logs of any other event and for logs whose data
/// does not decode; neither is an error for the caller.
pub fn decode_deposit_log(log: &RawLog) -> Option<DepositEvent> {
    if log.topics.len() != 3 || normalize_hex(&log.topics[0]) != deposit_event_topic() {
        return None;
    }

    let account = topic_to_address(&log.topics[1])?;
    let token = topic_to_address(&log.topics[2])?;

    let data = decode_hex(&log.data)?;
    let canister_offset = read_offset(word(&data, 0)?)?;
    let amount = U256::from_big_endian(word(&data, 1)?);
    let chain_offset = read_offset(word(&data, 2)?)?;

    Some(DepositEvent {
        account,
        token,
        canister_id: read_string(&data, canister_offset)?,
        amount: amount.to_string(),
        chain: read_string(&data, chain_offset)?,
    })
}

/// Encode a deposit event as a raw log.
///
/// Returns `None` when an address is not 20 bytes of hex or the amount is
/// not an unsigned 256-bit integer.
pub fn encode_deposit_log(event: &DepositEvent) -> Option<RawLog> {
    let account = address_to_topic(&event.account)?;
    let token = address_to_topic(&event.token)?;

    let amount = U256::from_dec_str(&normalize_amount(&event.amount)?).ok()?;
    let mut amount_word = [0u8; WORD];
    amount.to_big_endian(&mut amount_word);

    let canister_tail = encode_string(&event.canister_id);
    let chain_tail = encode_string(&event.chain);

    let head_len = 3 * WORD;
    let mut data = Vec::with_capacity(head_len + canister_tail.len() + chain_tail.len());
    data.extend_from_slice(&offset_word(head_len));
    data.extend_from_slice(&amount_word);
    data.extend_from_slice(&offset_word(head_len + canister_tail.len()));
    data.extend_from_slice(&canister_tail);
    data.extend_from_slice(&chain_tail);

    Some(RawLog {
        data: format!("0x{}", hex::encode(data)),
        topics: vec![deposit_event_topic(), account, token],
    })
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let canonical = normalize_hex(value);
    hex::decode(&canonical[2..]).ok()
}

fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    let start = index.checked_mul(WORD)?;
    data.get(start..start.checked_add(WORD)?)
}

/// Offsets and lengths must fit in the low 8 bytes of their word.
fn read_offset(word: &[u8]) -> Option<usize> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low)).ok()
}

fn read_string(data: &[u8], offset: usize) -> Option<String> {
    let len = read_offset(data.get(offset..offset.checked_add(WORD)?)?)?;
    let start = offset.checked_add(WORD)?;
    let bytes = data.get(start..start.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

fn topic_to_address(topic: &str) -> Option<String> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != WORD || bytes[..WORD - 20].iter().any(|b| *b != 0) {
        return None;
    }
    Some(format!("0x{}", hex::encode(&bytes[WORD - 20..])))
}

fn address_to_topic(address: &str) -> Option<String> {
    let bytes = decode_hex(address)?;
    if bytes.len() != 20 {
        return None;
    }
    let mut topic = [0u8; WORD];
    topic[WORD - 20..].copy_from_slice(&bytes);
    Some(format!("0x{}", hex::encode(topic)))
}

fn offset_word(value: usize) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    out
}

fn encode_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&offset_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DepositEvent {
        DepositEvent {
            account: "0x00000000000000000000000000000000000000aa".to_string(),
            token: "0x00000000000000000000000000000000000000bb".to_string(),
            canister_id: "ryjl3-tyaaa-aaaaa-aaaba-cai".to_string(),
            amount: "1000000000000000000".to_string(),
            chain: "ethereum".to_string(),
        }
    }

    #[test]
    fn test_topic_is_keccak_of_signature() {
        let topic = deposit_event_topic();
        assert_eq!(topic.len(), 66);
        assert!(topic.starts_with("0x"));
        assert_eq!(
            topic,
            format!("0x{}", hex::encode(keccak256(DEPOSIT_EVENT_SIGNATURE.as_bytes())))
        );
    }

    #[test]
    fn test_keccak_empty_input() {
        // Well-known Keccak-256 of the empty string.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_decode_encoded_event() {
        let log = encode_deposit_log(&event()).unwrap();
        assert_eq!(decode_deposit_log(&log), Some(event()));
    }

    #[test]
    fn test_string_longer_than_one_word() {
        let mut e = event();
        e.canister_id = "a-canister-identifier-that-spans-more-than-thirty-two-bytes".to_string();
        let log = encode_deposit_log(&e).unwrap();
        assert_eq!(decode_deposit_log(&log).unwrap().canister_id, e.canister_id);
    }

    #[test]
    fn test_foreign_event_skipped() {
        let mut log = encode_deposit_log(&event()).unwrap();
        log.topics[0] = format!("0x{}", hex::encode(keccak256(b"Transfer(address,address,uint256)")));
        assert!(decode_deposit_log(&log).is_none());
    }

    #[test]
    fn test_truncated_data_skipped() {
        let mut log = encode_deposit_log(&event()).unwrap();
        log.data.truncate(2 + 64 * 3);
        assert!(decode_deposit_log(&log).is_none());
    }

    #[test]
    fn test_wrong_topic_count_skipped() {
        let mut log = encode_deposit_log(&event()).unwrap();
        log.topics.pop();
        assert!(decode_deposit_log(&log).is_none());
    }

    #[test]
    fn test_encode_rejects_short_address() {
        let mut e = event();
        e.account = "0xabc".to_string();
        assert!(encode_deposit_log(&e).is_none());
    }

    #[test]
    fn test_uppercase_topic_hex_accepted() {
        let mut log = encode_deposit_log(&event()).unwrap();
        log.topics = log.topics.iter().map(|t| t.to_uppercase().replacen("0X", "0x", 1)).collect();
        log.data = log.data.to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(decode_deposit_log(&log), Some(event()));
    }
}
