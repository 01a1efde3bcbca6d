// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Security module - vendor request signing

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ProxyConfig;

/// Signing fields sent alongside a forwarded sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub access_key: String,
    pub data_type: String,
    pub signature_version: String,
    pub signature: String,
    pub timestamp: i64,
}

/// Signs identify requests with HMAC-SHA1 over the request description
pub struct RequestSigner {
    access_key: String,
    secret: SecretString,
    endpoint: String,
    data_type: String,
    signature_version: String,
}

impl RequestSigner {
    pub fn new(access_key: &str, secret: SecretString, endpoint: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret,
            endpoint: endpoint.to_string(),
            data_type: "audio".to_string(),
            signature_version: "1".to_string(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        let signer = Self {
            access_key: config.access_key.clone(),
            secret: SecretString::new(config.access_secret.clone()),
            endpoint: config.endpoint.clone(),
            data_type: config.data_type.clone(),
            signature_version: config.signature_version.clone(),
        };
        if !signer.has_credentials() {
            warn!("No vendor credentials configured; requests will be rejected");
        }
        signer
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret.expose_secret().is_empty()
    }

    /// `POST\n{endpoint}\n{access_key}\n{data_type}\n{signature_version}\n{timestamp}`
    pub fn string_to_sign(&self, timestamp: i64) -> String {
        format!(
            "POST\n{}\n{}\n{}\n{}\n{}",
            self.endpoint, self.access_key, self.data_type, self.signature_version, timestamp
        )
    }

    pub fn sign(&self, timestamp: i64) -> SignedRequest {
        let signature = hmac_sha1_base64(self.secret.expose_secret().as_bytes(), &self.string_to_sign(timestamp));
        SignedRequest {
            access_key: self.access_key.clone(),
            data_type: self.data_type.clone(),
            signature_version: self.signature_version.clone(),
            signature,
            timestamp,
        }
    }

    /// Sign with the current Unix time in seconds
    pub fn sign_now(&self) -> SignedRequest {
        self.sign(chrono::Utc::now().timestamp())
    }
}

fn hmac_sha1_base64(secret: &[u8], message: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    let tag = hmac::sign(&key, message.as_bytes());
    STANDARD.encode(tag.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha1_reference_vector() {
        assert_eq!(
            hmac_sha1_base64(b"Jefe", "what do ya want for nothing?"),
            "7/zfauXrL6LSdBbV8YTfnCWafHk="
        );
    }

    #[test]
    fn test_signed_fields() {
        let signer = RequestSigner::new("test-key", SecretString::new("test-secret".to_string()), "/v1/identify");
        assert_eq!(
            signer.string_to_sign(1_700_000_000),
            "POST\n/v1/identify\ntest-key\naudio\n1\n1700000000"
        );

        let signed = signer.sign(1_700_000_000);
        assert_eq!(signed.signature, "iBfU+Pr4tncyMr9T7iihwUaPJGA=");
        assert_eq!(signed.access_key, "test-key");
        assert_eq!(signed.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_missing_credentials() {
        let signer = RequestSigner::from_config(&ProxyConfig::default());
        assert!(!signer.has_credentials());
    }
}
