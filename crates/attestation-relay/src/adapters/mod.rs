//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits for the attestation relay.

mod destination_rpc;
mod ledger_rpc;
mod memory_store;
mod rpc;
mod validation_network;

pub use destination_rpc::{JsonRpcDestinationClient, PROCESS_EVENT_METHOD};
pub use ledger_rpc::JsonRpcLedgerClient;
pub use memory_store::InMemoryClaimStore;
pub use rpc::{JsonRpcTransport, RpcError};
pub use validation_network::{
    InMemoryValidationNetwork, NetworkPublisher, PublisherIdentity, DEFAULT_STREAM_CAPACITY,
};
