//! Step detection - L1 delta threshold with cooldown

use tracing::trace;

use super::{ActivityEvent, DetectorOutput, DetectorState, EventDetector, EventKind, ResumePolicy};
use crate::config::StepConfig;
use crate::sensors::Sample;

pub struct StepDetector {
    state: DetectorState,
    resume: ResumePolicy,
}

impl StepDetector {
    pub fn new(threshold: f64, cooldown_ms: u64, resume: ResumePolicy) -> Self {
        Self {
            state: DetectorState::new(threshold, cooldown_ms),
            resume,
        }
    }

    pub fn from_config(config: &StepConfig) -> Self {
        Self::new(config.threshold, config.cooldown_ms, config.resume)
    }
}

impl EventDetector for StepDetector {
    fn name(&self) -> &'static str {
        "step"
    }

    fn on_sample(&mut self, sample: &Sample, now_ms: u64) -> DetectorOutput {
        let delta = sample.l1_delta(&self.state.last_sample);
        self.state.last_sample = *sample;

        if delta > self.state.threshold && self.state.cooled_down(now_ms) {
            self.state.last_event_ms = Some(now_ms);
            trace!(delta, now_ms, "step");
            return DetectorOutput::Fired(ActivityEvent {
                kind: EventKind::Step,
                magnitude: delta,
                at_ms: now_ms,
            });
        }
        DetectorOutput::NoEvent
    }

    fn on_restart(&mut self) {
        if self.resume == ResumePolicy::ZeroVector {
            self.state.last_sample = Sample::ZERO;
        }
    }

    fn state(&self) -> &DetectorState {
        &self.state
    }
}
