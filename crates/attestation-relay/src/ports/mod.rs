//! # Ports
//!
//! `inbound` is what the runtime drives (`AttestationRelayApi`); `outbound`
//! is what the relay needs from the ledger, the validation network, the
//! claim cache and the destination, with recording mocks for tests.

pub mod inbound;
pub mod outbound;

pub use inbound::{AttestationRelayApi, ValidationOutcome};
pub use outbound::{
    ClaimStore, DestinationClient, DispatchAck, LedgerClient, MockDestinationClient,
    MockLedgerClient, MockPublisher, ValidationPublisher,
};
