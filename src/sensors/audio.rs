// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Microphone loudness source

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use super::{Sample, SensorStatus, SensorType, SignalSource, SourceCapability};
use crate::analysis::LevelAnalyser;
use crate::config::NoiseConfig;
use crate::error::Result;

/// Turns captured PCM frames (one per animation frame) into loudness samples
pub struct AudioLevelSource {
    id: String,
    status: SensorStatus,
    capability: SourceCapability,
    frames: mpsc::Receiver<Vec<f32>>,
    analyser: LevelAnalyser,
    last_level: f64,
}

impl AudioLevelSource {
    pub fn new(
        id: &str,
        capability: SourceCapability,
        config: &NoiseConfig,
        frames: mpsc::Receiver<Vec<f32>>,
    ) -> Self {
        Self {
            id: id.to_string(),
            status: SensorStatus::Disconnected,
            capability,
            frames,
            analyser: LevelAnalyser::new(config),
            last_level: 0.0,
        }
    }

    pub fn channel(
        id: &str,
        capability: SourceCapability,
        config: &NoiseConfig,
        buffer: usize,
    ) -> (Self, mpsc::Sender<Vec<f32>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(id, capability, config, rx), tx)
    }

    /// Instantaneous level of the most recent frame
    pub fn last_level(&self) -> f64 {
        self.last_level
    }
}

#[async_trait]
impl SignalSource for AudioLevelSource {
    fn id(&self) -> &str { &self.id }
    fn sensor_type(&self) -> SensorType { SensorType::Microphone }
    fn status(&self) -> SensorStatus { self.status }

    async fn connect(&mut self) -> Result<()> {
        self.status = SensorStatus::Connecting;
        if let Err(e) = self.capability.check(SensorType::Microphone) {
            self.status = if self.capability.supported {
                SensorStatus::Denied
            } else {
                SensorStatus::Unavailable
            };
            return Err(e);
        }

        while self.frames.try_recv().is_ok() {}
        self.analyser.reset();
        self.status = SensorStatus::Active;
        info!("Microphone capture started: {}", self.id);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.status = SensorStatus::Disconnected;
        info!("Microphone capture closed: {}", self.id);
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.status != SensorStatus::Active {
            return Ok(None);
        }
        match self.frames.recv().await {
            Some(frame) => {
                self.last_level = self.analyser.average_level(&frame);
                Ok(Some(Sample::scalar(self.last_level)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::sensors::PermissionState;

    #[tokio::test]
    async fn test_frames_become_levels() {
        let config = NoiseConfig::default();
        let (mut source, tx) = AudioLevelSource::channel("mic", SourceCapability::available(), &config, 4);
        source.connect().await.unwrap();

        tx.send(vec![0.0; 256]).await.unwrap();
        let tone: Vec<f32> = (0..256)
            .map(|i| 0.8 * (2.0 * std::f32::consts::PI * 8.0 * i as f32 / 256.0).sin())
            .collect();
        tx.send(tone).await.unwrap();

        assert_eq!(source.next_sample().await.unwrap(), Some(Sample::Scalar(0.0)));
        let level = source.next_sample().await.unwrap().unwrap().value();
        assert!(level > 0.0);
        assert_eq!(source.last_level(), level);
    }

    #[tokio::test]
    async fn test_microphone_permission_denied() {
        let config = NoiseConfig::default();
        let (mut source, _tx) = AudioLevelSource::channel(
            "mic",
            SourceCapability::requires(PermissionState::Denied),
            &config,
            4,
        );
        assert!(matches!(source.connect().await, Err(TrackerError::PermissionDenied(_))));
        assert_eq!(source.next_sample().await.unwrap(), None);
    }
}
