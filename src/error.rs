// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Error taxonomy shared by trackers, storage and recognition

use thiserror::Error;

/// Errors surfaced by the tracking engine
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Sensor or API not supported on this platform
    #[error("{0} is not supported on this device")]
    CapabilityUnavailable(String),

    /// User declined a capability grant
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Recognition round trip failed
    #[error("network failure: {0}")]
    TransientNetworkFailure(String),

    /// Vendor answered with a non-zero status or an empty result set
    #[error("vendor rejected sample (code {code}): {msg}")]
    VendorRejected { code: i64, msg: String },

    /// Durable store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// A second writer tried to claim an owned key
    #[error("key '{0}' already has a writer")]
    KeyAlreadyOwned(String),

    /// Sequential multi-key reset stopped midway
    #[error("reset incomplete, keys not reset: {}", remaining.join(", "))]
    PartialReset {
        reset: Vec<String>,
        remaining: Vec<String>,
        #[source]
        cause: Box<TrackerError>,
    },

    /// Stored value could not be decoded
    #[error("cannot decode '{key}': {reason}")]
    Decode { key: String, reason: String },
}

impl TrackerError {
    /// Terminal errors end a tracker for this session; nothing retries them automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackerError::CapabilityUnavailable(_) | TrackerError::PermissionDenied(_)
        )
    }

    /// "No match" outcomes are not failures from the user's point of view.
    pub fn is_no_match(&self) -> bool {
        matches!(self, TrackerError::VendorRejected { .. })
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        TrackerError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        TrackerError::TransientNetworkFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
