// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Device motion source - acceleration including gravity

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{PermissionPrompt, PermissionState, Sample, SensorStatus, SensorType, SignalSource, SourceCapability};
use crate::error::Result;

/// Raw device-motion event; any axis may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl MotionEvent {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x: Some(x), y: Some(y), z: Some(z) }
    }
}

impl From<MotionEvent> for Sample {
    fn from(event: MotionEvent) -> Self {
        Sample::from_axes(event.x, event.y, event.z)
    }
}

/// Accelerometer fed by platform motion events over a channel
pub struct MotionSource {
    id: String,
    status: SensorStatus,
    capability: SourceCapability,
    prompt: Option<Box<dyn PermissionPrompt>>,
    events: mpsc::Receiver<MotionEvent>,
}

impl MotionSource {
    pub fn new(id: &str, capability: SourceCapability, events: mpsc::Receiver<MotionEvent>) -> Self {
        Self {
            id: id.to_string(),
            status: SensorStatus::Disconnected,
            capability,
            prompt: None,
            events,
        }
    }

    /// Create a source together with the sender the platform glue pushes events into
    pub fn channel(id: &str, capability: SourceCapability, buffer: usize) -> (Self, mpsc::Sender<MotionEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(id, capability, rx), tx)
    }

    /// Prompt used when the platform wants an explicit grant
    pub fn with_prompt(mut self, prompt: Box<dyn PermissionPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Update the capability, e.g. after the user answers a permission prompt
    pub fn set_capability(&mut self, capability: SourceCapability) {
        self.capability = capability;
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.events.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[async_trait]
impl SignalSource for MotionSource {
    fn id(&self) -> &str { &self.id }
    fn sensor_type(&self) -> SensorType { SensorType::Accelerometer }
    fn status(&self) -> SensorStatus { self.status }

    async fn connect(&mut self) -> Result<()> {
        self.status = SensorStatus::Connecting;
        if self.capability.supported && self.capability.permission == PermissionState::Prompt {
            if let Some(prompt) = &self.prompt {
                let answer = prompt.request(SensorType::Accelerometer).await;
                debug!("{}: motion permission answered {:?}", self.id, answer);
                self.capability.permission = answer;
            }
        }
        if let Err(e) = self.capability.check(SensorType::Accelerometer) {
            self.status = if self.capability.supported {
                SensorStatus::Denied
            } else {
                SensorStatus::Unavailable
            };
            return Err(e);
        }

        let stale = self.discard_pending();
        if stale > 0 {
            debug!("{}: discarded {} events delivered while unsubscribed", self.id, stale);
        }
        self.status = SensorStatus::Active;
        info!("Subscribed to device motion: {}", self.id);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.status = SensorStatus::Disconnected;
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.status != SensorStatus::Active {
            return Ok(None);
        }
        Ok(self.events.recv().await.map(Sample::from))
    }
}
