//! # Per-Key Locks
//!
//! Serializes read-modify-write sequences on the claim store per claim
//! identity. Distinct identities never contend; entries are dropped from
//! the table once no task holds or awaits them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of async mutexes keyed by string.
#[derive(Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    ///
    /// Dropping the future while it waits still releases the table entry.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        // Declared before the entry so it drops after it on cancellation
        let mut held = KeyGuard {
            locks: self,
            key: key.to_string(),
            guard: None,
        };
        let entry = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        held.guard = Some(entry.lock_owned().await);
        held
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.table.lock().len()
    }
}

/// Holds a key's lock until dropped.
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the table and waiters.
        drop(self.guard.take());

        let mut table = self.locks.table.lock();
        if let Some(entry) = table.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                table.remove(&self.key);
            }
        }
    }
}
