// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! TrackSense - Activity Tracking Engine
//!
//! Turns raw sensor streams into durable activity counters:
//! - Step counting from accelerometer deltas with a refractory cooldown
//! - Jump / dance classification by acceleration magnitude
//! - Loudest-noise tracking from FFT-based microphone levels
//! - A combined activity total with a sequential, reportable reset
//! - Periodic song recognition that attributes activity to the song playing
//! - A signing proxy for the recognition vendor
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TrackSense                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌───────────┐  ┌─────────────┐                 │
//! │  │ Signal  │→ │   Event   │→ │ Accumulator │─┐               │
//! │  │ Source  │  │ Detector  │  │   (owner)   │ │               │
//! │  └─────────┘  └───────────┘  └─────────────┘ │               │
//! │       ×3 trackers: steps, movements, noise   ↓               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │          Key-value store (SQLite, change feed)          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │       ↓                         ↓                            │
//! │  ┌───────────────┐   ┌──────────────────────┐   ┌─────────┐  │
//! │  │ AggregateView │ → │ Recognition session  │ → │  Proxy  │  │
//! │  │    (total)    │   │ (snapshot attribution)│   │ (HMAC)  │  │
//! │  └───────────────┘   └──────────────────────┘   └─────────┘  │
//! │       ↓                         ↓                            │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                       Event Bus                         │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod sensors;
pub mod analysis;
pub mod detection;
pub mod tracking;
pub mod recognition;
pub mod security;
pub mod config;
pub mod db;
pub mod error;

#[cfg(feature = "proxy")]
pub mod proxy;

// Re-exports for convenience
pub use config::Config;
pub use core::{EventBus, TrackerStatus};
pub use sensors::{Sample, SensorType, SignalSource};
pub use detection::{ActivityEvent, EventDetector, EventKind};
pub use tracking::{Accumulator, AggregateView, Tracker};
pub use recognition::{RecognitionSession, Song};
pub use db::{Database, KeyValueStore, SharedStore};
pub use error::{Result, TrackerError};

/// TrackSense version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TrackSense name
pub const NAME: &str = "TrackSense";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "proxy")]
    features.push("proxy".to_string());

    features
}
