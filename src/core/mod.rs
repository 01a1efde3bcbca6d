//! Core module - event bus, timers and tracker status

mod event_bus;
mod timer;

pub use event_bus::{wait_until_started, Event, EventBus, EventPayload, EventType};
pub use timer::{CountdownTimer, TimerState};

use serde::{Deserialize, Serialize};

/// Lifecycle of one tracker; the last value doubles as its status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerStatus {
    Idle,
    Starting,
    Tracking,
    Stopped,
    /// Ended with an error; terminal for this session when the cause was a capability
    Failed(String),
}

impl TrackerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TrackerStatus::Starting | TrackerStatus::Tracking)
    }

    /// Text suitable for a transient status line
    pub fn message(&self) -> String {
        match self {
            TrackerStatus::Idle => "Idle".to_string(),
            TrackerStatus::Starting => "Starting...".to_string(),
            TrackerStatus::Tracking => "Tracking".to_string(),
            TrackerStatus::Stopped => "Stopped".to_string(),
            TrackerStatus::Failed(reason) => reason.clone(),
        }
    }
}

impl Default for TrackerStatus {
    fn default() -> Self {
        TrackerStatus::Idle
    }
}
