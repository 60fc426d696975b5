//! API route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::Engine;
use serde::Deserialize;

use donorlink_core::error::DonorLinkError;
use donorlink_core::traits::RecordStore;
use donorlink_core::types::{Document, Fields, NotificationRecord, RequestEvent, fields};
use donorlink_notify::{RequestCreatedHandler, TriggerContext};
use donorlink_vision::LabelVerifier;

use super::server::AppState;

type ApiResponse = (StatusCode, Json<serde_json::Value>);

const MAX_NOTIFICATION_LIMIT: usize = 200;

fn error_response(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(serde_json::json!({"ok": false, "error": message})))
}

/// Liveness check.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Hello from DonorLink!",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Trigger body: the created document under `requests/{requestId}`.
#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub data: Document,
}

/// A request document was created — run the dispatch.
pub async fn trigger_request_created(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TriggerBody>,
) -> ApiResponse {
    if body.request_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "requestId is required");
    }
    let event = match RequestEvent::from_document(&body.request_id, &body.data) {
        Ok(e) => e,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let ctx = TriggerContext::new("http");
    match state.controller.on_request_created(&ctx, event).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "report": report})),
        ),
        Err(e @ DonorLinkError::Persistence(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// In-app notifications for a user, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResponse {
    let limit = query.limit.unwrap_or(50).min(MAX_NOTIFICATION_LIMIT);
    let store = state.controller.store();
    let collection = &state.controller.collections().notifications;

    match store.find_by(collection, fields::TO_UID, &uid, limit).await {
        Ok(docs) => {
            let notifications: Vec<NotificationRecord> = docs
                .iter()
                .map(|(id, doc)| NotificationRecord::from_document(id, doc))
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({"ok": true, "notifications": notifications})),
            )
        }
        Err(e) => {
            tracing::error!("❌ Failed to list notifications for {uid}: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(rename = "fcmToken")]
    pub fcm_token: String,
}

/// Save the device registration token for a user.
pub async fn register_token(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(body): Json<TokenBody>,
) -> ApiResponse {
    let token = body.fcm_token.trim();
    if token.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "fcmToken is required");
    }
    let mut update = Fields::new();
    update.insert(fields::FCM_TOKEN.into(), token.into());

    let users = &state.controller.collections().users;
    match state.controller.store().set(users, &uid, update).await {
        Ok(()) => {
            tracing::info!(uid = %uid, "🔑 Push token registered");
            (StatusCode::OK, Json(serde_json::json!({"ok": true})))
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyImageBody {
    /// Base64-encoded image bytes.
    pub image: String,
    #[serde(default, rename = "expectedLabels")]
    pub expected_labels: Option<Vec<String>>,
}

/// Verify a donation photo against expected labels.
pub async fn verify_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyImageBody>,
) -> ApiResponse {
    let Some(labeler) = state.labeler.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "image verification is not configured",
        );
    };
    let image = match base64::engine::general_purpose::STANDARD.decode(body.image.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "image is empty"),
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("invalid base64 image: {e}"));
        }
    };

    let custom;
    let verifier = match &body.expected_labels {
        Some(expected) => {
            custom = LabelVerifier::new(expected, state.config.vision.min_confidence);
            &custom
        }
        None => &state.verifier,
    };

    match donorlink_vision::verify_image(labeler.as_ref(), verifier, &image).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "expectedLabels": verifier.expected(),
                "verification": report,
            })),
        ),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}
