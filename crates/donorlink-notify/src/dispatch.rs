//! Dispatch controller — one linear pass per created request.
//!
//! ```text
//! RECEIVED → VALIDATED → DONOR_RESOLVED → COMPOSED → PERSISTED
//!     │                                                 ├─▶ PUSH_SENT    ─┐
//!     └─▶ REJECTED                                      ├─▶ PUSH_SKIPPED ─┼─▶ DONE
//!                                                       └─▶ PUSH_FAILED  ─┘
//! ```
//! The only fatal exit is a failed notification write. Push never retries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use donorlink_core::config::CollectionsConfig;
use donorlink_core::error::{DonorLinkError, Result};
use donorlink_core::traits::{DeliveryResult, PushClient, RecordStore};
use donorlink_core::types::{DonorRecord, PushPayload, RequestEvent};

use crate::compose;

/// Metadata about one trigger delivery.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerContext {
    /// Unique per delivery. Redeliveries of the same request get new ids.
    pub delivery_id: String,
    /// Which transport delivered it ("http", "cli", ...).
    pub source: String,
    pub received_at: DateTime<Utc>,
}

impl TriggerContext {
    pub fn new(source: &str) -> Self {
        Self {
            delivery_id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// Per-dispatch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchState {
    Received,
    Validated,
    DonorResolved,
    Composed,
    Persisted,
    PushSent,
    PushSkipped,
    PushFailed,
    Done,
    Rejected,
}

/// Why push was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DonorNotFound,
    /// Donor lookup errored; treated like a missing donor.
    DonorLookupFailed,
    NoToken,
}

/// Result of the best-effort push step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    Sent { message_id: Option<String> },
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Validation failed; nothing was written.
    Rejected { reason: String },
    Done {
        notification_id: String,
        push: PushOutcome,
    },
}

/// What a dispatch did, returned to the trigger source.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub request_id: String,
    pub delivery_id: String,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
    /// States visited, in order.
    pub states: Vec<DispatchState>,
}

impl DispatchReport {
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Rejected { .. })
    }

    pub fn notification_id(&self) -> Option<&str> {
        match &self.outcome {
            DispatchOutcome::Done {
                notification_id, ..
            } => Some(notification_id),
            DispatchOutcome::Rejected { .. } => None,
        }
    }

    pub fn push(&self) -> Option<&PushOutcome> {
        match &self.outcome {
            DispatchOutcome::Done { push, .. } => Some(push),
            DispatchOutcome::Rejected { .. } => None,
        }
    }
}

/// Entry point for trigger transports.
#[async_trait]
pub trait RequestCreatedHandler: Send + Sync {
    /// Handle one created request. `Err` only for fatal failures the
    /// trigger infrastructure may retry.
    async fn on_request_created(
        &self,
        ctx: &TriggerContext,
        event: RequestEvent,
    ) -> Result<DispatchReport>;
}

/// Visited-state log for one dispatch.
struct Trace<'a> {
    request_id: &'a str,
    states: Vec<DispatchState>,
}

impl<'a> Trace<'a> {
    fn start(request_id: &'a str) -> Self {
        let mut trace = Self {
            request_id,
            states: Vec::with_capacity(8),
        };
        trace.advance(DispatchState::Received);
        trace
    }

    fn advance(&mut self, state: DispatchState) {
        tracing::debug!(request_id = self.request_id, ?state, "dispatch state");
        self.states.push(state);
    }
}

/// Orchestrates validate → resolve → compose → persist → push.
///
/// Holds only shared clients; safe to call concurrently.
pub struct DispatchController {
    store: Arc<dyn RecordStore>,
    push: Arc<dyn PushClient>,
    collections: CollectionsConfig,
}

impl DispatchController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        push: Arc<dyn PushClient>,
        collections: CollectionsConfig,
    ) -> Self {
        Self {
            store,
            push,
            collections,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn collections(&self) -> &CollectionsConfig {
        &self.collections
    }

    /// Run one dispatch for a newly created request.
    pub async fn handle_request_created(
        &self,
        ctx: &TriggerContext,
        event: &RequestEvent,
    ) -> Result<DispatchReport> {
        let request_id = event.request_id.as_str();
        let mut trace = Trace::start(request_id);

        let Some(donor_uid) = event.donor_uid() else {
            tracing::info!(
                request_id,
                delivery_id = %ctx.delivery_id,
                "🚫 No donorUid in request, nothing to notify"
            );
            trace.advance(DispatchState::Rejected);
            return Ok(DispatchReport {
                request_id: request_id.to_string(),
                delivery_id: ctx.delivery_id.clone(),
                outcome: DispatchOutcome::Rejected {
                    reason: "missing donorUid".into(),
                },
                states: trace.states,
            });
        };
        trace.advance(DispatchState::Validated);

        let (donor, skip) = self.resolve_donor(request_id, donor_uid).await;
        trace.advance(DispatchState::DonorResolved);

        let (title, message) = compose::compose(event);
        let record = compose::notification_record(event, donor_uid, &title, &message);
        trace.advance(DispatchState::Composed);

        let notification_id = self
            .store
            .add(&self.collections.notifications, record.to_fields())
            .await
            .map_err(|e| {
                tracing::error!(request_id, donor_uid, "❌ Error storing notification: {e}");
                match e {
                    DonorLinkError::Persistence(msg) => DonorLinkError::Persistence(msg),
                    other => DonorLinkError::Persistence(other.to_string()),
                }
            })?;
        tracing::info!(
            request_id,
            donor_uid,
            notification_id = %notification_id,
            "✅ Notification stored for donor"
        );
        trace.advance(DispatchState::Persisted);

        let push = match donor.and_then(|d| d.fcm_token) {
            Some(token) => {
                let payload = compose::push_payload(event, donor_uid, &title, &message);
                self.deliver(request_id, donor_uid, &token, &payload).await
            }
            None => {
                let reason = skip.unwrap_or(SkipReason::NoToken);
                tracing::info!(request_id, donor_uid, ?reason, "⏭️ Push skipped");
                PushOutcome::Skipped { reason }
            }
        };
        trace.advance(match push {
            PushOutcome::Sent { .. } => DispatchState::PushSent,
            PushOutcome::Skipped { .. } => DispatchState::PushSkipped,
            PushOutcome::Failed { .. } => DispatchState::PushFailed,
        });
        trace.advance(DispatchState::Done);

        Ok(DispatchReport {
            request_id: request_id.to_string(),
            delivery_id: ctx.delivery_id.clone(),
            outcome: DispatchOutcome::Done {
                notification_id,
                push,
            },
            states: trace.states,
        })
    }

    /// Look up the donor. Never fails: problems degrade to "no token".
    async fn resolve_donor(
        &self,
        request_id: &str,
        donor_uid: &str,
    ) -> (Option<DonorRecord>, Option<SkipReason>) {
        match self.store.get(&self.collections.users, donor_uid).await {
            Ok(Some(doc)) => {
                let donor = DonorRecord::from_document(donor_uid, &doc);
                if donor.fcm_token.is_none() {
                    tracing::warn!(request_id, donor_uid, "⚠️ No FCM token found for donor");
                }
                (Some(donor), None)
            }
            Ok(None) => {
                tracing::warn!(request_id, donor_uid, "⚠️ Donor record not found");
                (None, Some(SkipReason::DonorNotFound))
            }
            Err(e) => {
                tracing::warn!(request_id, donor_uid, "⚠️ Donor lookup failed: {e}");
                (None, Some(SkipReason::DonorLookupFailed))
            }
        }
    }

    /// Single push attempt. Failures are logged, not returned.
    async fn deliver(
        &self,
        request_id: &str,
        donor_uid: &str,
        token: &str,
        payload: &PushPayload,
    ) -> PushOutcome {
        match self.push.send_to_token(token, payload).await {
            Ok(DeliveryResult::Delivered { message_id }) => {
                tracing::info!(request_id, donor_uid, "📩 Push notification sent to donor");
                PushOutcome::Sent { message_id }
            }
            Ok(DeliveryResult::Rejected { reason }) => {
                tracing::error!(request_id, donor_uid, "❌ Push rejected: {reason}");
                PushOutcome::Failed { reason }
            }
            Err(e) => {
                tracing::error!(request_id, donor_uid, "❌ Error sending push notification: {e}");
                PushOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl RequestCreatedHandler for DispatchController {
    async fn on_request_created(
        &self,
        ctx: &TriggerContext,
        event: RequestEvent,
    ) -> Result<DispatchReport> {
        self.handle_request_created(ctx, &event).await
    }
}
