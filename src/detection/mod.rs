// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Detection module - turns sample streams into activity events
//!
//! Each metric gets one parameterised detector. Detectors are pure state
//! machines: the caller supplies the arrival time of every sample, so the
//! same detector runs unchanged under a live clock or in tests.

mod step;
mod gesture;
mod noise;

pub use step::StepDetector;
pub use gesture::GestureDetector;
pub use noise::NoiseDetector;

use serde::{Deserialize, Serialize};

use crate::sensors::Sample;

/// Kind of a discrete activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Step,
    /// Gesture above the high band
    Jump,
    /// Gesture between the mid and high bands
    Dance,
}

impl EventKind {
    /// Label shown while the gesture is on display
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Step => "Step",
            EventKind::Jump => "Jumping",
            EventKind::Dance => "Dancing",
        }
    }
}

/// A detected occurrence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: EventKind,
    pub magnitude: f64,
    pub at_ms: u64,
}

/// Result of feeding one sample to a detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorOutput {
    /// Count this event
    Fired(ActivityEvent),
    /// Offer this level to a running maximum
    Level(f64),
    NoEvent,
}

impl DetectorOutput {
    pub fn fired(&self) -> bool {
        matches!(self, DetectorOutput::Fired(_))
    }
}

/// Where the previous vector comes from when a stopped tracker starts again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Start from the zero vector; the first sample after a restart is compared with (0, 0, 0)
    ZeroVector,
    /// Continue from the last vector seen before stopping
    LastVector,
}

/// Per-detector state, mutated only by incoming samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorState {
    pub last_sample: Sample,
    /// Arrival time of the last accepted event; `None` until the first one
    pub last_event_ms: Option<u64>,
    pub threshold: f64,
    pub cooldown_ms: u64,
}

impl DetectorState {
    pub fn new(threshold: f64, cooldown_ms: u64) -> Self {
        Self {
            last_sample: Sample::ZERO,
            last_event_ms: None,
            threshold,
            cooldown_ms,
        }
    }

    /// True when enough time has passed since the last accepted event
    pub fn cooled_down(&self, now_ms: u64) -> bool {
        match self.last_event_ms {
            Some(last) => now_ms.saturating_sub(last) > self.cooldown_ms,
            None => true,
        }
    }
}

/// Stateful filter from samples to events
pub trait EventDetector: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Evaluate one sample that arrived at `now_ms`
    fn on_sample(&mut self, sample: &Sample, now_ms: u64) -> DetectorOutput;

    /// Called when a stopped tracker subscribes again
    fn on_restart(&mut self) {}

    /// Cancel anything time-bound that is still pending
    fn cancel_pending(&mut self) {}

    fn state(&self) -> &DetectorState;
}
