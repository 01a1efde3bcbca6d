//! Gesture classification - jump / dance by acceleration magnitude
//!
//! A detected gesture stays on display for a fixed window. While the window is
//! open no new gesture is classified, independently of any counting cooldown.

use tracing::debug;

use super::{ActivityEvent, DetectorOutput, DetectorState, EventDetector, EventKind};
use crate::config::GestureConfig;
use crate::sensors::Sample;

pub struct GestureDetector {
    state: DetectorState,
    high_band: f64,
    display_window_ms: u64,
    busy_until_ms: Option<u64>,
    showing: Option<EventKind>,
}

impl GestureDetector {
    pub fn new(high_band: f64, mid_band: f64, display_window_ms: u64) -> Self {
        Self {
            state: DetectorState::new(mid_band, 0),
            high_band,
            display_window_ms,
            busy_until_ms: None,
            showing: None,
        }
    }

    pub fn from_config(config: &GestureConfig) -> Self {
        Self::new(config.high_band, config.mid_band, config.display_window_ms)
    }

    /// True while a previous gesture is still on display
    pub fn is_busy(&self, now_ms: u64) -> bool {
        self.busy_until_ms.is_some_and(|until| now_ms < until)
    }

    /// Gesture currently on display, if its window is still open
    pub fn current_movement(&self, now_ms: u64) -> Option<EventKind> {
        if self.is_busy(now_ms) { self.showing } else { None }
    }

    fn classify(&self, magnitude: f64) -> Option<EventKind> {
        if magnitude > self.high_band {
            Some(EventKind::Jump)
        } else if magnitude > self.state.threshold {
            Some(EventKind::Dance)
        } else {
            None
        }
    }
}

impl EventDetector for GestureDetector {
    fn name(&self) -> &'static str {
        "gesture"
    }

    fn on_sample(&mut self, sample: &Sample, now_ms: u64) -> DetectorOutput {
        self.state.last_sample = *sample;

        if self.is_busy(now_ms) {
            return DetectorOutput::NoEvent;
        }
        if self.showing.take().is_some() {
            self.busy_until_ms = None;
        }

        let magnitude = sample.magnitude();
        match self.classify(magnitude) {
            Some(kind) => {
                self.state.last_event_ms = Some(now_ms);
                self.busy_until_ms = Some(now_ms.saturating_add(self.display_window_ms));
                self.showing = Some(kind);
                debug!(magnitude, "{}", kind.label());
                DetectorOutput::Fired(ActivityEvent { kind, magnitude, at_ms: now_ms })
            }
            None => DetectorOutput::NoEvent,
        }
    }

    fn cancel_pending(&mut self) {
        self.busy_until_ms = None;
        self.showing = None;
    }

    fn state(&self) -> &DetectorState {
        &self.state
    }
}
