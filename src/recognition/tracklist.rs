//! Recognised songs with the activity attributed to each

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Song;
use crate::db::{keys, read_json, write_json, KeyValueStore};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub song: Song,
    pub recognized_at: DateTime<Utc>,
    /// Activity gained while this song was the active one
    pub activity: u64,
}

impl TrackRecord {
    pub fn new(song: Song) -> Self {
        Self {
            id: Uuid::new_v4(),
            song,
            recognized_at: Utc::now(),
            activity: 0,
        }
    }
}

/// Ordered list stored as JSON under the `tracklist` key, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tracklist {
    records: Vec<TrackRecord>,
}

impl Tracklist {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(read_json(store, keys::TRACKLIST)?.unwrap_or_default())
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        write_json(store, keys::TRACKLIST, self)
    }

    pub fn push(&mut self, record: TrackRecord) {
        self.records.push(record);
    }

    /// Most recently recognised record
    pub fn latest(&self) -> Option<&TrackRecord> {
        self.records.last()
    }

    pub fn get(&self, id: Uuid) -> Option<&TrackRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Add `delta` to the record with `id`. Returns false when there is none.
    pub fn attribute(&mut self, id: Uuid, delta: u64) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.activity = record.activity.saturating_add(delta);
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
