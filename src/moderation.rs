//! Image moderation.
//!
//! Image payloads are sent to an external classifier before they are
//! written. The classifier answers with a class label and a confidence
//! percentage; only confidently neutral images are kept.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MODERATION_URL: &str = "http://api.docker.localhost/image/";
pub const DEFAULT_ACCEPTED_CLASS: &str = "Neutral";
pub const DEFAULT_MIN_CONFIDENCE: f64 = 70.0;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("moderation service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid moderation response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Class label and confidence for a single image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModerationVerdict {
    pub class: String,
    pub percentage: f64,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    result: ModerationVerdict,
}

/// Decides which verdicts let an image through.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationPolicy {
    pub accepted_class: String,
    pub min_confidence: f64,
}

impl ModerationPolicy {
    pub fn accepts(&self, verdict: &ModerationVerdict) -> bool {
        verdict.class == self.accepted_class && verdict.percentage >= self.min_confidence
    }
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            accepted_class: DEFAULT_ACCEPTED_CLASS.to_string(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Trait for image classifiers.
#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn classify(&self, image: Bytes) -> Result<ModerationVerdict, ModerationError>;
}

/// Client for the HTTP classification endpoint.
///
/// Posts the image as a multipart form with a single `image` field and
/// expects `{"result": {"class": ..., "percentage": ...}}` back.
#[derive(Clone)]
pub struct HttpModerationClient {
    client: Client,
    endpoint: String,
}

impl HttpModerationClient {
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self, ModerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ContentModerator for HttpModerationClient {
    async fn classify(&self, image: Bytes) -> Result<ModerationVerdict, ModerationError> {
        let form = Form::new().part("image", Part::stream(image).file_name("image"));
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModerationError::Status(response.status()));
        }

        let body = response.bytes().await?;
        let parsed: ModerationResponse = serde_json::from_slice(&body)?;
        Ok(parsed.result)
    }
}
