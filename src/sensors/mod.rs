//! Sensor module - signal sources feeding the detectors

mod traits;
mod motion;
mod audio;
mod simulator;

pub use traits::{
    PermissionPrompt, PermissionState, Sample, SensorStatus, SensorType, SignalSource, SourceCapability,
};
pub use motion::{MotionEvent, MotionSource};
pub use audio::AudioLevelSource;
pub use simulator::SensorSimulator;
