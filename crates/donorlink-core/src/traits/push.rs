//! Push delivery trait — registration-token-addressed device notifications.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::PushPayload;

/// What the push service said about one send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered { message_id: Option<String> },
    /// The service answered but refused this token/payload
    /// (e.g. unregistered token, quota).
    Rejected { reason: String },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered { .. })
    }
}

/// Push delivery client.
///
/// Transport problems come back as `DonorLinkError::Transport`; callers
/// treat every failure as recoverable.
#[async_trait]
pub trait PushClient: Send + Sync {
    fn name(&self) -> &str;

    async fn send_to_token(&self, token: &str, payload: &PushPayload) -> Result<DeliveryResult>;
}
