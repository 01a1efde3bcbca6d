// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Durable key-value storage
//!
//! Every accumulator and aggregate receives a [`KeyValueStore`] at construction
//! instead of reaching for a global. Writers claim their keys through
//! [`KeyClaims`] so a key never has two writers at once.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{Database, DatabaseStats};

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{Result, TrackerError};

/// Well-known storage keys
pub mod keys {
    pub const STEP_COUNT: &str = "stepCount";
    pub const MOVEMENT_COUNT: &str = "movementCount";
    pub const HIGHEST_NOISE_LEVEL: &str = "highestNoiseLevel";
    pub const DETECTION_COUNT: &str = "detectionCount";
    pub const TRACKLIST: &str = "tracklist";

    /// Keys summed into the total activity figure
    pub const ACTIVITY_KEYS: [&str; 4] = [
        STEP_COUNT,
        MOVEMENT_COUNT,
        HIGHEST_NOISE_LEVEL,
        DETECTION_COUNT,
    ];
}

/// Notification emitted after a key is written or removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChange {
    pub key: String,
    pub value: Option<String>,
}

/// Storage port shared by all trackers
pub trait KeyValueStore: Send + Sync {
    /// Read the current value of a key
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value; durable once this returns
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key
    fn remove(&self, key: &str) -> Result<()>;

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<KeyChange>;

    /// Writer registry for this namespace
    fn claims(&self) -> &KeyClaims;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read a stored integer. Missing or unparsable values read as 0.
pub fn read_count(store: &dyn KeyValueStore, key: &str) -> Result<u64> {
    Ok(store.get(key)?.as_deref().map(parse_count).unwrap_or(0))
}

/// Lenient integer parse: leading decimal digits, anything else is 0.
///
/// `"40.7"` reads as 40, `"abc"` and `"-3"` read as 0.
pub fn parse_count(raw: &str) -> u64 {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Read a JSON document stored under `key`
pub fn read_json<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TrackerError::Decode { key: key.to_string(), reason: e.to_string() }),
        None => Ok(None),
    }
}

/// Write a JSON document under `key`
pub fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| TrackerError::Decode { key: key.to_string(), reason: e.to_string() })?;
    store.set(key, &raw)
}

/// Registry of keys that currently have a writer
#[derive(Clone, Default)]
pub struct KeyClaims {
    owned: Arc<Mutex<HashSet<String>>>,
}

impl KeyClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exclusive write access to `key` until the returned guard drops
    pub fn claim(&self, key: &str) -> Result<KeyClaim> {
        let mut owned = self.owned.lock();
        if !owned.insert(key.to_string()) {
            return Err(TrackerError::KeyAlreadyOwned(key.to_string()));
        }
        Ok(KeyClaim {
            key: key.to_string(),
            owned: self.owned.clone(),
        })
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.owned.lock().contains(key)
    }
}

/// Write ownership of a single key
#[derive(Debug)]
pub struct KeyClaim {
    key: String,
    owned: Arc<Mutex<HashSet<String>>>,
}

impl KeyClaim {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyClaim {
    fn drop(&mut self) {
        self.owned.lock().remove(&self.key);
    }
}
