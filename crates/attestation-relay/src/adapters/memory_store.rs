//! In-Memory Claim Store Adapter
//!
//! Implements `ClaimStore` as a volatile key/value map. Nothing survives a
//! restart; in-flight claims are hand-off data, not a ledger of record.

use crate::domain::{CorrelationKey, RelayResult};
use crate::ports::outbound::ClaimStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Volatile claim cache.
#[derive(Default)]
pub struct InMemoryClaimStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryClaimStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `key` has a value.
    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.read().contains_key(key.as_str())
    }
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    async fn get(&self, key: &CorrelationKey) -> RelayResult<Option<String>> {
        Ok(self.entries.read().get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CorrelationKey, value: String) -> RelayResult<()> {
        trace!("[relay] store set {}", key);
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &CorrelationKey) -> RelayResult<()> {
        trace!("[relay] store delete {}", key);
        self.entries.write().remove(key.as_str());
        Ok(())
    }
}
