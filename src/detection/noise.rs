//! Noise level - every sample feeds a running maximum

use super::{DetectorOutput, DetectorState, EventDetector};
use crate::sensors::Sample;

pub struct NoiseDetector {
    state: DetectorState,
    current_level: f64,
}

impl NoiseDetector {
    pub fn new() -> Self {
        Self {
            state: DetectorState::new(0.0, 0),
            current_level: 0.0,
        }
    }

    /// Level of the most recent sample
    pub fn current_level(&self) -> f64 {
        self.current_level
    }
}

impl Default for NoiseDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDetector for NoiseDetector {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn on_sample(&mut self, sample: &Sample, _now_ms: u64) -> DetectorOutput {
        self.state.last_sample = *sample;
        self.current_level = sample.value().max(0.0);
        DetectorOutput::Level(self.current_level)
    }

    fn state(&self) -> &DetectorState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sample_is_a_level() {
        let mut detector = NoiseDetector::new();
        for (t, level) in [12.0, 3.0, 40.5].into_iter().enumerate() {
            assert_eq!(detector.on_sample(&Sample::scalar(level), t as u64), DetectorOutput::Level(level));
        }
        assert_eq!(detector.current_level(), 40.5);
        assert_eq!(detector.on_sample(&Sample::scalar(f64::NAN), 4), DetectorOutput::Level(0.0));
    }
}
