//! Log-only push client — records what would have been sent.
//! Used when no push transport is configured, and in tests.

use std::sync::Mutex;

use async_trait::async_trait;
use donorlink_core::error::Result;
use donorlink_core::traits::{DeliveryResult, PushClient};
use donorlink_core::types::PushPayload;

/// Max entries kept in history.
const HISTORY_LIMIT: usize = 100;

/// One recorded push.
#[derive(Debug, Clone)]
pub struct SentPush {
    pub token: String,
    pub payload: PushPayload,
}

/// Push client that only logs. Always reports delivery.
#[derive(Default)]
pub struct LogPushClient {
    history: Mutex<Vec<SentPush>>,
}

impl LogPushClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded pushes, oldest first (last 100).
    pub fn history(&self) -> Vec<SentPush> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PushClient for LogPushClient {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_to_token(&self, token: &str, payload: &PushPayload) -> Result<DeliveryResult> {
        tracing::info!(
            token_prefix = %token.chars().take(8).collect::<String>(),
            "📨 [log push] {}: {}",
            payload.title,
            payload.body
        );
        if let Ok(mut history) = self.history.lock() {
            history.push(SentPush {
                token: token.to_string(),
                payload: payload.clone(),
            });
            // Ring buffer
            if history.len() > HISTORY_LIMIT {
                history.remove(0);
            }
        }
        Ok(DeliveryResult::Delivered { message_id: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: usize) -> PushPayload {
        PushPayload {
            title: "New Donation Request".into(),
            body: format!("body {n}"),
            data: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_records_sends() {
        let client = LogPushClient::new();
        let result = client.send_to_token("tok123", &payload(1)).await.unwrap();
        assert!(result.is_delivered());
        let history = client.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].token, "tok123");
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let client = LogPushClient::new();
        for n in 0..(HISTORY_LIMIT + 5) {
            client.send_to_token("tok", &payload(n)).await.unwrap();
        }
        let history = client.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].payload.body, "body 5");
    }
}
