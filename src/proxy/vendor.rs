// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Forwarding of identify requests to the recognition vendor

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ProxyConfig;
use crate::security::RequestSigner;

#[derive(Debug, Error)]
pub enum ForwardError {
    /// Vendor answered with an error status; body kept as sent
    #[error("vendor returned HTTP {status}")]
    Rejected { status: u16, body: Value },

    #[error("{0}")]
    Transport(String),
}

impl ForwardError {
    /// Value reported to the client in the `error` field
    pub fn payload(&self) -> Value {
        match self {
            ForwardError::Rejected { body, .. } => body.clone(),
            ForwardError::Transport(message) => Value::String(message.clone()),
        }
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        ForwardError::Transport(e.to_string())
    }
}

/// Something that can identify an uploaded sample
#[async_trait]
pub trait VendorClient: Send + Sync {
    async fn identify(&self, sample: Bytes) -> Result<Value, ForwardError>;
}

/// Signed multipart forwarding over HTTPS
pub struct SignedVendor {
    http: reqwest::Client,
    url: String,
    signer: RequestSigner,
}

impl SignedVendor {
    pub fn new(config: &ProxyConfig) -> Result<Self, ForwardError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: config.vendor_url(),
            signer: RequestSigner::from_config(config),
        })
    }

    fn form(&self, sample: Bytes) -> Result<Form, ForwardError> {
        let sample_bytes = sample.len();
        let signed = self.signer.sign_now();
        let part = Part::bytes(sample.to_vec())
            .file_name("sample.wav")
            .mime_str("audio/wav")?;

        Ok(Form::new()
            .part("sample", part)
            .text("access_key", signed.access_key)
            .text("data_type", signed.data_type)
            .text("signature_version", signed.signature_version)
            .text("signature", signed.signature)
            .text("timestamp", signed.timestamp.to_string())
            .text("sample_bytes", sample_bytes.to_string()))
    }
}

#[async_trait]
impl VendorClient for SignedVendor {
    async fn identify(&self, sample: Bytes) -> Result<Value, ForwardError> {
        let form = self.form(sample)?;

        info!("Sending request to {}", self.url);
        let response = self.http.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let parsed: Value = serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

        if !status.is_success() {
            return Err(ForwardError::Rejected { status: status.as_u16(), body: parsed });
        }
        debug!("Vendor response: {}", parsed);
        Ok(parsed)
    }
}
