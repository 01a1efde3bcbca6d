// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Durable counter / running maximum bound to one storage key

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::db::{read_count, KeyClaim, SharedStore};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccumulatorMode {
    /// Add one per event
    Count,
    /// Keep the largest value offered
    Max,
}

/// Sole writer of one key.
///
/// Mutations start from the durable value, so a reset performed through
/// [`AggregateView::reset_all`](super::AggregateView::reset_all) is picked up
/// by the next increment. Every mutation is persisted before it returns.
pub struct Accumulator {
    store: SharedStore,
    claim: KeyClaim,
    mode: AccumulatorMode,
    value: u64,
}

impl Accumulator {
    /// Claim `key` and load its current value
    pub fn open(store: SharedStore, key: &str, mode: AccumulatorMode) -> Result<Self> {
        let claim = store.claims().claim(key)?;
        let value = read_count(store.as_ref(), key)?;
        debug!(key, value, ?mode, "Accumulator opened");

        Ok(Self {
            store,
            claim,
            mode,
            value,
        })
    }

    /// Add exactly one and persist
    pub fn increment(&mut self) -> Result<u64> {
        let next = read_count(self.store.as_ref(), self.key())?.saturating_add(1);
        self.store.set(self.key(), &next.to_string())?;
        self.value = next;
        trace!(key = %self.key(), value = next, "Incremented");
        Ok(next)
    }

    /// Raise the value to `candidate` if larger; never lowers it
    pub fn update_max(&mut self, candidate: u64) -> Result<u64> {
        let durable = read_count(self.store.as_ref(), self.key())?;
        if candidate > durable {
            self.store.set(self.key(), &candidate.to_string())?;
            trace!(key = %self.key(), value = candidate, "New maximum");
        }
        self.value = durable.max(candidate);
        Ok(self.value)
    }

    pub fn reset(&mut self) -> Result<u64> {
        self.store.set(self.key(), "0")?;
        self.value = 0;
        debug!(key = %self.key(), "Accumulator reset");
        Ok(0)
    }

    /// Value after the last mutation or refresh
    pub fn current_value(&self) -> u64 {
        self.value
    }

    /// Re-read the durable value, e.g. after an external reset
    pub fn refresh(&mut self) -> Result<u64> {
        self.value = read_count(self.store.as_ref(), self.key())?;
        Ok(self.value)
    }

    pub fn key(&self) -> &str {
        self.claim.key()
    }

    pub fn mode(&self) -> AccumulatorMode {
        self.mode
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{keys, Database, KeyValueStore, MemoryStore};
    use crate::error::TrackerError;

    fn memory() -> SharedStore {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_n_increments_count_n() {
        let store = memory();
        let mut steps = Accumulator::open(store.clone(), keys::STEP_COUNT, AccumulatorMode::Count).unwrap();

        for expected in 1..=7 {
            assert_eq!(steps.increment().unwrap(), expected);
        }
        assert_eq!(steps.current_value(), 7);
        assert_eq!(store.get(keys::STEP_COUNT).unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn test_update_max_never_decreases() {
        let mut noise = Accumulator::open(memory(), keys::HIGHEST_NOISE_LEVEL, AccumulatorMode::Max).unwrap();

        for candidate in [10, 5, 10] {
            assert_eq!(noise.update_max(candidate).unwrap(), 10);
        }
        assert_eq!(noise.update_max(12).unwrap(), 12);
    }

    #[test]
    fn test_reset_then_read_is_zero() {
        let mut steps = Accumulator::open(memory(), keys::STEP_COUNT, AccumulatorMode::Count).unwrap();
        steps.increment().unwrap();
        steps.increment().unwrap();

        assert_eq!(steps.reset().unwrap(), 0);
        assert_eq!(steps.current_value(), 0);
        assert_eq!(steps.increment().unwrap(), 1);
    }

    #[test]
    fn test_second_writer_is_refused() {
        let store = memory();
        let first = Accumulator::open(store.clone(), keys::MOVEMENT_COUNT, AccumulatorMode::Count).unwrap();

        let second = Accumulator::open(store.clone(), keys::MOVEMENT_COUNT, AccumulatorMode::Count);
        assert!(matches!(second, Err(TrackerError::KeyAlreadyOwned(_))));

        drop(first);
        assert!(Accumulator::open(store, keys::MOVEMENT_COUNT, AccumulatorMode::Count).is_ok());
    }

    #[test]
    fn test_external_reset_is_picked_up() {
        let store = memory();
        let mut steps = Accumulator::open(store.clone(), keys::STEP_COUNT, AccumulatorMode::Count).unwrap();
        for _ in 0..5 {
            steps.increment().unwrap();
        }

        store.set(keys::STEP_COUNT, "0").unwrap();
        assert_eq!(steps.current_value(), 5);
        assert_eq!(steps.refresh().unwrap(), 0);
        assert_eq!(steps.increment().unwrap(), 1);
    }

    #[test]
    fn test_max_without_increase_does_not_write() {
        let store = memory();
        let mut noise = Accumulator::open(store.clone(), keys::HIGHEST_NOISE_LEVEL, AccumulatorMode::Max).unwrap();
        noise.update_max(40).unwrap();

        let mut changes = store.subscribe();
        noise.update_max(12).unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_value_survives_reopen() {
        let store: SharedStore = Arc::new(Database::open_in_memory().unwrap());
        {
            let mut detections = Accumulator::open(store.clone(), keys::DETECTION_COUNT, AccumulatorMode::Count).unwrap();
            detections.increment().unwrap();
            detections.increment().unwrap();
        }

        let detections = Accumulator::open(store, keys::DETECTION_COUNT, AccumulatorMode::Count).unwrap();
        assert_eq!(detections.current_value(), 2);
    }
}
