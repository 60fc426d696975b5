//! Image labeling — trait seam plus an HTTP client for a labeling service.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use donorlink_core::config::VisionConfig;
use donorlink_core::error::{DonorLinkError, Result};

/// A label the service assigned to an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageLabel {
    pub text: String,
    /// 0.0 – 1.0
    pub confidence: f32,
}

impl ImageLabel {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

/// Image labeling service.
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    async fn label(&self, image: &[u8]) -> Result<Vec<ImageLabel>>;
}

/// Labels images through an HTTP service.
///
/// Request: `POST {endpoint}` `{"image": "<base64>"}`.
/// Response: `{"labels": [{"text": "...", "confidence": 0.9}]}`.
pub struct HttpImageLabeler {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpImageLabeler {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(DonorLinkError::Config("vision.endpoint is not set".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DonorLinkError::Vision(format!("client init failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct LabelResponse {
    #[serde(default)]
    labels: Vec<ImageLabel>,
}

fn parse_labels(body: &str) -> Result<Vec<ImageLabel>> {
    let resp: LabelResponse = serde_json::from_str(body)
        .map_err(|e| DonorLinkError::Vision(format!("Invalid labeler response: {e}")))?;
    Ok(resp.labels)
}

#[async_trait]
impl ImageLabeler for HttpImageLabeler {
    async fn label(&self, image: &[u8]) -> Result<Vec<ImageLabel>> {
        if image.is_empty() {
            return Err(DonorLinkError::Vision("empty image".into()));
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "image": encoded }));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| DonorLinkError::Vision(format!("Labeler request failed: {e}")))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DonorLinkError::Vision(format!("Labeler error {status}: {body}")));
        }
        parse_labels(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels(
            r#"{"labels": [{"text": "Wheelchair", "confidence": 0.91}, {"text": "Room", "confidence": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0], ImageLabel::new("Wheelchair", 0.91));
    }

    #[test]
    fn test_parse_missing_labels_is_empty() {
        assert!(parse_labels("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(parse_labels("<html>"), Err(DonorLinkError::Vision(_))));
    }

    #[test]
    fn test_requires_endpoint() {
        let config = VisionConfig::default();
        assert!(HttpImageLabeler::new(&config).is_err());
    }
}
