// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! HTTP client for the recognition proxy

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use super::{Song, VendorResponse};
use crate::config::RecognitionConfig;
use crate::error::{Result, TrackerError};

/// Turns an audio sample into a song
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn identify(&self, sample: Vec<u8>) -> Result<Song>;
}

/// Posts samples to `POST /api/identify`
pub struct RecognitionClient {
    http: reqwest::Client,
    url: String,
}

impl RecognitionClient {
    pub fn new(config: &RecognitionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            url: config.proxy_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a sample and decode the relayed vendor response
    pub async fn post_sample(&self, sample: Vec<u8>) -> Result<VendorResponse> {
        let sample_bytes = sample.len();
        let part = Part::bytes(sample).file_name("sample.wav").mime_str("audio/wav")?;
        let form = Form::new()
            .part("sample", part)
            .text("sample_bytes", sample_bytes.to_string());

        debug!("Posting {} byte sample to {}", sample_bytes, self.url);
        let response = self.http.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!("Recognition request failed: {}", detail);
            return Err(TrackerError::TransientNetworkFailure(detail));
        }

        serde_json::from_slice(&body)
            .map_err(|e| TrackerError::TransientNetworkFailure(format!("invalid response: {}", e)))
    }
}

/// Vendor status message inside an error body, if there is one
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .pointer("/status/msg")
        .or_else(|| value.pointer("/error/status/msg"))
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn identify(&self, sample: Vec<u8>) -> Result<Song> {
        let song = self.post_sample(sample).await?.into_song()?;
        info!("Recognised {}", song);
        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_vendor_message() {
        assert_eq!(
            error_detail(br#"{"status": {"code": 3001, "msg": "Missing/Invalid Access Key"}}"#).as_deref(),
            Some("Missing/Invalid Access Key")
        );
        assert_eq!(
            error_detail(br#"{"message": "Failed to recognize audio", "error": "timeout"}"#).as_deref(),
            Some("Failed to recognize audio")
        );
        assert_eq!(error_detail(b"<html>bad gateway</html>"), None);
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_transient() {
        let config = RecognitionConfig {
            proxy_url: "http://127.0.0.1:1/api/identify".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let client = RecognitionClient::new(&config).unwrap();

        match client.identify(vec![0u8; 16]).await {
            Err(TrackerError::TransientNetworkFailure(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
