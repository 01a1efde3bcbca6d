// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Total activity across a fixed set of accumulator keys

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::db::{keys, read_count, KeyChange, SharedStore};
use crate::error::{Result, TrackerError};

/// Read-only sum over named keys, plus a sequential reset of all of them
pub struct AggregateView {
    store: SharedStore,
    keys: Vec<String>,
}

impl AggregateView {
    pub fn new(store: SharedStore, keys: &[&str]) -> Self {
        Self {
            store,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// View over the four activity keys
    pub fn activity(store: SharedStore) -> Self {
        Self::new(store, &keys::ACTIVITY_KEYS)
    }

    /// Sum of the latest durable values
    pub fn recompute(&self) -> Result<u64> {
        let mut total: u64 = 0;
        for key in &self.keys {
            total = total.saturating_add(read_count(self.store.as_ref(), key)?);
        }
        Ok(total)
    }

    /// Reset every key to 0 in order, then recompute.
    ///
    /// Stops at the first failure and reports the keys that were not reset.
    /// Keys already reset stay reset.
    pub fn reset_all(&self) -> Result<u64> {
        for (index, key) in self.keys.iter().enumerate() {
            if let Err(cause) = self.store.set(key, "0") {
                warn!(key = %key, "Reset stopped: {}", cause);
                return Err(TrackerError::PartialReset {
                    reset: self.keys[..index].to_vec(),
                    remaining: self.keys[index..].to_vec(),
                    cause: Box::new(cause),
                });
            }
        }
        debug!("Reset {} keys", self.keys.len());
        self.recompute()
    }

    /// Wait for a change to one of the watched keys and return the new total.
    ///
    /// Returns `None` once the store stops publishing changes.
    pub async fn next_total(&self, changes: &mut broadcast::Receiver<KeyChange>) -> Result<Option<u64>> {
        loop {
            match changes.recv().await {
                Ok(change) if self.watches(&change.key) => return self.recompute().map(Some),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Change feed lagged, recomputing");
                    return self.recompute().map(Some);
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    pub fn watches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Subscribe to the underlying store's change feed
    pub fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
        self.store.subscribe()
    }
}
