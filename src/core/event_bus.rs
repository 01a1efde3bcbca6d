// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Event bus for inter-component communication

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::TrackerStatus;
use crate::detection::ActivityEvent;

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Activity,
    Level,
    Status,
    Total,
    Recognition,
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A counted event and the accumulator value after it
    Activity { tracker: String, event: ActivityEvent, value: u64 },
    /// A level sample that raised the running maximum
    Level { tracker: String, level: f64, max: u64 },
    Status { tracker: String, status: TrackerStatus },
    Total { total: u64 },
    /// Status line of the recognition session
    Recognition { message: String },
}

/// Central event bus for pub/sub communication
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish_activity(&self, tracker: &str, event: ActivityEvent, value: u64) {
        self.publish_event(
            EventType::Activity,
            EventPayload::Activity { tracker: tracker.to_string(), event, value },
        );
    }

    pub fn publish_level(&self, tracker: &str, level: f64, max: u64) {
        self.publish_event(
            EventType::Level,
            EventPayload::Level { tracker: tracker.to_string(), level, max },
        );
    }

    pub fn publish_status(&self, tracker: &str, status: TrackerStatus) {
        self.publish_event(
            EventType::Status,
            EventPayload::Status { tracker: tracker.to_string(), status },
        );
    }

    pub fn publish_total(&self, total: u64) {
        self.publish_event(EventType::Total, EventPayload::Total { total });
    }

    pub fn publish_recognition(&self, message: &str) {
        self.publish_event(
            EventType::Recognition,
            EventPayload::Recognition { message: message.to_string() },
        );
    }

    fn publish_event(&self, event_type: EventType, payload: EventPayload) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            event_type,
            timestamp: Utc::now(),
            payload,
        };
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Number of events published so far
    pub fn published(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

/// Wait for `tracker` to finish starting.
///
/// Returns `Tracking` once samples are being taken, or the `Failed`/`Stopped`
/// status if it never got there. `None` when the bus closed first. Subscribe
/// before spawning the tracker so the status cannot be missed.
pub async fn wait_until_started(
    events: &mut broadcast::Receiver<Event>,
    tracker: &str,
) -> Option<TrackerStatus> {
    loop {
        match events.recv().await {
            Ok(Event { payload: EventPayload::Status { tracker: name, status }, .. }) if name == tracker => {
                match status {
                    TrackerStatus::Idle | TrackerStatus::Starting => continue,
                    settled => return Some(settled),
                }
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::EventKind;

    #[test]
    fn test_events_are_numbered_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_events();

        bus.publish_status("steps", TrackerStatus::Tracking);
        bus.publish_activity(
            "steps",
            ActivityEvent { kind: EventKind::Step, magnitude: 2.5, at_ms: 10 },
            1,
        );
        bus.publish_total(46);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let third = rx.try_recv().unwrap();
        assert_eq!((first.id, second.id, third.id), (0, 1, 2));
        assert_eq!(second.event_type, EventType::Activity);
        assert!(matches!(third.payload, EventPayload::Total { total: 46 }));
        assert_eq!(bus.published(), 3);
    }

    #[tokio::test]
    async fn test_wait_until_started_skips_other_trackers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe_events();

        bus.publish_status("noise", TrackerStatus::Tracking);
        bus.publish_status("steps", TrackerStatus::Starting);
        bus.publish_total(3);
        bus.publish_status("steps", TrackerStatus::Failed("Device motion unavailable".into()));

        assert_eq!(
            wait_until_started(&mut rx, "steps").await,
            Some(TrackerStatus::Failed("Device motion unavailable".into()))
        );

        drop(bus);
        assert_eq!(wait_until_started(&mut rx, "steps").await, None);
    }
}
