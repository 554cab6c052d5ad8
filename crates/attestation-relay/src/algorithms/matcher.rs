//! # Receipt Matcher
//!
//! Finds the ledger log backing a change notification. Pure filter over
//! the receipts the ledger client supplied; no I/O.

use super::decoder::decode_deposit_log;
use crate::domain::{
    invariant_parameters_match, invariant_watched_contract, ClaimEnvelope, ClaimParameters,
    RelayError, RelayResult, TransactionReceipt, VALIDATION_CHANNEL_ID,
};
use tracing::{debug, warn};

/// Matches claims against receipts sent to one watched contract.
#[derive(Clone, Debug)]
pub struct ReceiptMatcher {
    contract_address: String,
    chain_id: String,
}

impl ReceiptMatcher {
    /// Create a matcher for `contract_address` on `chain_id`.
    pub fn new(contract_address: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            chain_id: chain_id.into(),
        }
    }

    /// Watched contract address.
    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    /// Find the log whose decoded event equals `claim`.
    ///
    /// Receipts not sent to the watched contract are ignored, as are logs
    /// that do not decode as the deposit event. When several logs match,
    /// the first in receipt order wins and the ambiguity is logged.
    ///
    /// # Errors
    ///
    /// `ReceiptNotFound` when no log matches.
    pub fn match_claim(
        &self,
        claim: &ClaimParameters,
        receipts: &[TransactionReceipt],
    ) -> RelayResult<ClaimEnvelope> {
        let mut matches = receipts
            .iter()
            .filter(|receipt| invariant_watched_contract(receipt, &self.contract_address))
            .flat_map(|receipt| receipt.logs.iter())
            .filter(|log| {
                decode_deposit_log(&log.raw)
                    .is_some_and(|event| invariant_parameters_match(claim, &event))
            });

        let Some(found) = matches.next() else {
            debug!(
                "[relay] No matching log among {} receipts in block {}",
                receipts.len(),
                claim.block_number
            );
            return Err(RelayError::ReceiptNotFound {
                block_number: claim.block_number,
            });
        };

        let extra = matches.count();
        if extra > 0 {
            warn!(
                "[relay] Ambiguous match in block {}: {} logs satisfy the claim, using log {} of tx {}",
                claim.block_number,
                extra + 1,
                found.log_index,
                found.transaction_hash
            );
        }

        Ok(ClaimEnvelope {
            chain_id: self.chain_id.clone(),
            channel_id: VALIDATION_CHANNEL_ID.to_string(),
            address: found.address.clone(),
            block_hash: found.block_hash.clone(),
            data: found.raw.data.clone(),
            log_index: found.log_index,
            topics: found.raw.topics.clone(),
            transaction_hash: found.transaction_hash.clone(),
        })
    }
}
