//! FCM push transport — legacy HTTP send API.
//! `POST {endpoint}` with `{to, notification, data}` and `Authorization: key=...`.

use std::time::Duration;

use async_trait::async_trait;
use donorlink_core::config::PushConfig;
use donorlink_core::error::{DonorLinkError, Result};
use donorlink_core::traits::{DeliveryResult, PushClient};
use donorlink_core::types::PushPayload;

/// Sends pushes through Firebase Cloud Messaging.
pub struct FcmPushClient {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmPushClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DonorLinkError::Transport(format!("FCM client init failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            server_key: config.server_key.clone(),
        })
    }
}

/// Request body for one device token.
fn request_body(token: &str, payload: &PushPayload) -> serde_json::Value {
    serde_json::json!({
        "to": token,
        "notification": {
            "title": payload.title,
            "body": payload.body,
        },
        "data": payload.data,
    })
}

/// Read the per-message result out of a 2xx FCM response.
fn parse_send_response(body: &serde_json::Value) -> DeliveryResult {
    let result = body["results"].get(0);
    if let Some(error) = result.and_then(|r| r["error"].as_str()) {
        return DeliveryResult::Rejected {
            reason: error.to_string(),
        };
    }
    if body["failure"].as_u64().unwrap_or(0) > 0 {
        return DeliveryResult::Rejected {
            reason: "unknown failure".into(),
        };
    }
    DeliveryResult::Delivered {
        message_id: result
            .and_then(|r| r["message_id"].as_str())
            .map(String::from),
    }
}

#[async_trait]
impl PushClient for FcmPushClient {
    fn name(&self) -> &str {
        "fcm"
    }

    async fn send_to_token(&self, token: &str, payload: &PushPayload) -> Result<DeliveryResult> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&request_body(token, payload))
            .send()
            .await
            .map_err(|e| DonorLinkError::Transport(format!("FCM send failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DonorLinkError::Transport(format!("FCM error {status}: {body}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DonorLinkError::Transport(format!("Invalid FCM response: {e}")))?;
        let result = parse_send_response(&body);
        tracing::debug!(?result, "FCM response");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let mut payload = PushPayload {
            title: "New Donation Request".into(),
            body: "Alice requested your donation: wheelchair".into(),
            data: Default::default(),
        };
        payload.data.insert("donorId".into(), "d1".into());
        payload.data.insert("requestId".into(), "r1".into());

        let body = request_body("tok123", &payload);
        assert_eq!(body["to"], "tok123");
        assert_eq!(body["notification"]["title"], "New Donation Request");
        assert_eq!(body["data"]["requestId"], "r1");
        assert_eq!(body["data"]["donorId"], "d1");
    }

    #[test]
    fn test_parse_success() {
        let body = json!({"success": 1, "failure": 0, "results": [{"message_id": "0:123"}]});
        assert_eq!(
            parse_send_response(&body),
            DeliveryResult::Delivered {
                message_id: Some("0:123".into())
            }
        );
    }

    #[test]
    fn test_parse_rejected_token() {
        let body = json!({"success": 0, "failure": 1, "results": [{"error": "NotRegistered"}]});
        assert_eq!(
            parse_send_response(&body),
            DeliveryResult::Rejected {
                reason: "NotRegistered".into()
            }
        );
    }

    #[test]
    fn test_parse_failure_without_detail() {
        let body = json!({"success": 0, "failure": 1});
        assert!(!parse_send_response(&body).is_delivered());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = PushConfig {
            backend: "fcm".into(),
            endpoint: "http://127.0.0.1:9/fcm/send".into(),
            server_key: "key".into(),
            timeout_secs: 2,
        };
        let client = FcmPushClient::new(&config).unwrap();
        let payload = PushPayload {
            title: "t".into(),
            body: "b".into(),
            data: Default::default(),
        };
        let err = client.send_to_token("tok", &payload).await.unwrap_err();
        assert!(matches!(err, DonorLinkError::Transport(_)));
    }
}
