// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Audio capture for recognition samples

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};

/// Records one recognition sample.
///
/// The session calls `request_access`, then `start`, waits out the recording
/// window and finally calls `stop` to collect the encoded sample. `abort`
/// replaces `stop` when the window is cancelled.
#[async_trait]
pub trait AudioCapture: Send {
    /// Ask for microphone access
    async fn request_access(&mut self) -> Result<()>;

    async fn start(&mut self) -> Result<()>;

    /// Finish recording and return the encoded sample
    async fn stop(&mut self) -> Result<Vec<u8>>;

    async fn abort(&mut self);
}

/// Serves an existing audio file as the recorded sample
pub struct FileCapture {
    path: PathBuf,
    data: Option<Vec<u8>>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), data: None }
    }
}

#[async_trait]
impl AudioCapture for FileCapture {
    async fn request_access(&mut self) -> Result<()> {
        if tokio::fs::metadata(&self.path).await.is_err() {
            return Err(TrackerError::CapabilityUnavailable(format!(
                "audio file {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| TrackerError::CapabilityUnavailable(format!("{}: {}", self.path.display(), e)))?;
        info!("Loaded {} bytes from {}", data.len(), self.path.display());
        self.data = Some(data);
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<u8>> {
        self.data
            .take()
            .ok_or_else(|| TrackerError::CapabilityUnavailable("recording was not started".to_string()))
    }

    async fn abort(&mut self) {
        self.data = None;
    }
}

/// Capture backed by an in-memory sample, with an optional denied grant
pub struct BufferCapture {
    sample: Vec<u8>,
    granted: bool,
    recording: bool,
}

impl BufferCapture {
    pub fn new(sample: Vec<u8>) -> Self {
        Self { sample, granted: true, recording: false }
    }

    pub fn denied() -> Self {
        Self { sample: Vec::new(), granted: false, recording: false }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

#[async_trait]
impl AudioCapture for BufferCapture {
    async fn request_access(&mut self) -> Result<()> {
        if self.granted {
            Ok(())
        } else {
            Err(TrackerError::PermissionDenied("Microphone".to_string()))
        }
    }

    async fn start(&mut self) -> Result<()> {
        self.recording = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<u8>> {
        self.recording = false;
        debug!("Captured {} bytes", self.sample.len());
        Ok(self.sample.clone())
    }

    async fn abort(&mut self) {
        self.recording = false;
    }
}

/// Encode mono samples in [-1, 1] as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
