//! In-process store for tests and demo runs

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{KeyChange, KeyClaims, KeyValueStore};
use crate::error::Result;

pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<KeyChange>,
    claims: KeyClaims,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
            claims: KeyClaims::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        let _ = self.changes.send(KeyChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        let _ = self.changes.send(KeyChange { key: key.to_string(), value: None });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
        self.changes.subscribe()
    }

    fn claims(&self) -> &KeyClaims {
        &self.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set("stepCount", "3").unwrap();
        store.remove("stepCount").unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            KeyChange { key: "stepCount".into(), value: Some("3".into()) }
        );
        assert_eq!(rx.try_recv().unwrap().value, None);
        assert!(store.is_empty());
    }
}
