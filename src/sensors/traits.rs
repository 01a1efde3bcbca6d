// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Sensor traits and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Sensor types the trackers consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// Acceleration including gravity, m/s²
    Accelerometer,
    /// Microphone loudness, analyser byte scale
    Microphone,
}

impl SensorType {
    pub fn capability_name(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "Device motion",
            SensorType::Microphone => "Microphone",
        }
    }
}

/// Sensor operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    Disconnected,
    Connecting,
    Active,
    Unavailable,
    Denied,
}

/// Permission state of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    /// Platform delivers events without asking
    NotRequired,
    /// Must be asked for before subscribing
    Prompt,
    Granted,
    Denied,
}

/// Asks the user for access to a sensor
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn request(&self, sensor_type: SensorType) -> PermissionState;
}

/// What the platform offers for a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCapability {
    pub supported: bool,
    pub permission: PermissionState,
}

impl SourceCapability {
    pub const fn available() -> Self {
        Self { supported: true, permission: PermissionState::NotRequired }
    }

    pub const fn unsupported() -> Self {
        Self { supported: false, permission: PermissionState::NotRequired }
    }

    pub const fn requires(permission: PermissionState) -> Self {
        Self { supported: true, permission }
    }

    /// Resolve the capability into a go / no-go for subscription
    pub fn check(&self, sensor_type: SensorType) -> Result<()> {
        if !self.supported {
            return Err(TrackerError::CapabilityUnavailable(
                sensor_type.capability_name().to_string(),
            ));
        }
        match self.permission {
            PermissionState::Prompt | PermissionState::Denied => Err(TrackerError::PermissionDenied(
                sensor_type.capability_name().to_string(),
            )),
            PermissionState::NotRequired | PermissionState::Granted => Ok(()),
        }
    }
}

/// One reading from a sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    Vector { x: f64, y: f64, z: f64 },
    Scalar(f64),
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

impl Sample {
    pub const ZERO: Sample = Sample::Vector { x: 0.0, y: 0.0, z: 0.0 };

    pub fn vector(x: f64, y: f64, z: f64) -> Self {
        Sample::Vector {
            x: finite_or_zero(x),
            y: finite_or_zero(y),
            z: finite_or_zero(z),
        }
    }

    /// Build from possibly-absent axes; absent or invalid axes read as 0
    pub fn from_axes(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Self::vector(x.unwrap_or(0.0), y.unwrap_or(0.0), z.unwrap_or(0.0))
    }

    pub fn scalar(value: f64) -> Self {
        Sample::Scalar(finite_or_zero(value))
    }

    /// Components as an array; a scalar occupies the first slot
    pub fn axes(&self) -> [f64; 3] {
        match *self {
            Sample::Vector { x, y, z } => [finite_or_zero(x), finite_or_zero(y), finite_or_zero(z)],
            Sample::Scalar(v) => [finite_or_zero(v), 0.0, 0.0],
        }
    }

    /// Euclidean magnitude
    pub fn magnitude(&self) -> f64 {
        self.axes().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Sum of per-axis absolute differences from `prev`
    pub fn l1_delta(&self, prev: &Sample) -> f64 {
        self.axes()
            .iter()
            .zip(prev.axes().iter())
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    /// Scalar value (magnitude for vectors)
    pub fn value(&self) -> f64 {
        match *self {
            Sample::Scalar(v) => finite_or_zero(v),
            Sample::Vector { .. } => self.magnitude(),
        }
    }
}

/// A stream of samples from one sensor
#[async_trait]
pub trait SignalSource: Send {
    /// Get source unique identifier
    fn id(&self) -> &str;

    /// Get sensor type
    fn sensor_type(&self) -> SensorType;

    /// Get current status
    fn status(&self) -> SensorStatus;

    /// Request permission and subscribe.
    ///
    /// Fails with `CapabilityUnavailable` or `PermissionDenied`; neither is retried.
    async fn connect(&mut self) -> Result<()>;

    /// Unsubscribe; samples delivered afterwards are discarded
    async fn disconnect(&mut self) -> Result<()>;

    /// Wait for the next sample in arrival order. `None` when the stream has ended.
    async fn next_sample(&mut self) -> Result<Option<Sample>>;
}
