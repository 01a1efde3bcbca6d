// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::detection::ResumePolicy;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Drive trackers from simulated sensors
    pub demo_mode: bool,

    /// Step detection
    pub step: StepConfig,

    /// Jump / dance classification
    pub gesture: GestureConfig,

    /// Noise level analysis
    pub noise: NoiseConfig,

    /// Song recognition client
    pub recognition: RecognitionConfig,

    /// Recognition proxy server
    pub proxy: ProxyConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            step: StepConfig::default(),
            gesture: GestureConfig::default(),
            noise: NoiseConfig::default(),
            recognition: RecognitionConfig::default(),
            proxy: ProxyConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.proxy.apply_env();
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;

            let mut config = config;
            config.proxy.apply_env();
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("tracksense"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Point the database inside a new data directory
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.database.path = data_dir.join("tracksense.db");
        self.data_dir = data_dir;
    }
}

/// Step detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// L1 delta between consecutive samples that counts as a step
    pub threshold: f64,

    /// Minimum milliseconds between two counted steps
    pub cooldown_ms: u64,

    /// How the previous vector is seeded when tracking restarts
    pub resume: ResumePolicy,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            threshold: 2.0,
            cooldown_ms: 500,
            resume: ResumePolicy::ZeroVector,
        }
    }
}

/// Gesture classification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Magnitude above which a gesture is a jump
    pub high_band: f64,

    /// Magnitude above which (up to `high_band`) a gesture is a dance
    pub mid_band: f64,

    /// How long a detected gesture stays on display, suppressing new ones
    pub display_window_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            high_band: 25.0,
            mid_band: 15.0,
            display_window_ms: 3000,
        }
    }
}

/// Noise level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// FFT size; half of it is the number of frequency bins averaged
    pub fft_size: usize,

    /// Temporal smoothing between frames (0 = none)
    pub smoothing: f64,

    /// Level that maps to byte 0
    pub min_decibels: f64,

    /// Level that maps to byte 255
    pub max_decibels: f64,

    /// Analysis frames per second
    pub frame_rate_hz: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            frame_rate_hz: 60.0,
        }
    }
}

/// Recognition client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Identify endpoint of the proxy
    pub proxy_url: String,

    /// Length of the audio capture sent for recognition
    pub recording_secs: u64,

    /// Countdown between automatic re-identifications
    pub reidentify_secs: u64,

    /// Request timeout for the proxy round trip
    pub request_timeout_secs: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:3000/api/identify".to_string(),
            recording_secs: 10,
            reidentify_secs: 120,
            request_timeout_secs: 30,
        }
    }
}

/// Recognition proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind_addr: String,
    pub port: u16,

    /// Vendor host
    pub host: String,
    /// Vendor identify path
    pub endpoint: String,
    pub access_key: String,
    /// Signing secret; prefer the `TRACKSENSE_ACCESS_SECRET` environment variable
    pub access_secret: String,
    pub data_type: String,
    pub signature_version: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            host: "identify-eu-west-1.acrcloud.com".to_string(),
            endpoint: "/v1/identify".to_string(),
            access_key: String::new(),
            access_secret: String::new(),
            data_type: "audio".to_string(),
            signature_version: "1".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Vendor identify URL
    pub fn vendor_url(&self) -> String {
        format!("https://{}{}", self.host, self.endpoint)
    }

    /// Credentials from the environment take precedence over the file
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("TRACKSENSE_ACCESS_KEY") {
            self.access_key = key;
        }
        if let Ok(secret) = std::env::var("TRACKSENSE_ACCESS_SECRET") {
            self.access_secret = secret;
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database path
    pub path: PathBuf,

    /// Use `PRAGMA synchronous = FULL`
    pub synchronous_full: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/tracksense.db"),
            synchronous_full: true,
        }
    }
}
