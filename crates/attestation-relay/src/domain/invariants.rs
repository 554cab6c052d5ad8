//! # Domain Invariants
//!
//! Business rules a receipt log must satisfy before it can back a claim.

use super::entities::{ClaimParameters, DepositEvent, TransactionReceipt};
use super::value_objects::hex_eq;

/// Invariant: the receipt was sent to the watched contract.
///
/// Address comparison is case-insensitive. Contract creations (`to` is
/// absent) never match.
pub fn invariant_watched_contract(receipt: &TransactionReceipt, contract_address: &str) -> bool {
    receipt
        .to
        .as_deref()
        .is_some_and(|to| hex_eq(to, contract_address))
}

/// Invariant: the decoded event carries exactly the claimed parameters.
///
/// Both sides are already normalized; hex fields are compared through
/// `hex_eq` anyway so a caller handing in raw values cannot slip a case
/// mismatch past the check.
pub fn invariant_parameters_match(claim: &ClaimParameters, event: &DepositEvent) -> bool {
    hex_eq(&event.account, &claim.account)
        && event.canister_id == claim.canister_id
        && event.amount == claim.amount
        && event.chain == claim.chain
        && hex_eq(&event.token, &claim.token)
}
