//! Data model shared by the dispatch pipeline and its adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{DonorLinkError, Result};

/// A stored document: top-level JSON object fields.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field names shared between the request schema, user documents and
/// notification records.
pub mod fields {
    pub const DONOR_UID: &str = "donorUid";
    pub const LEGACY_DONOR_ID: &str = "donorId";
    pub const FCM_TOKEN: &str = "fcmToken";
    pub const TITLE: &str = "title";
    pub const MESSAGE: &str = "message";
    pub const TO_UID: &str = "toUid";
    pub const RECEIVER_UID: &str = "receiverUid";
    pub const REQUEST_ID: &str = "requestId";
    pub const TIMESTAMP: &str = "timestamp";
}

/// Version of the request document schema this crate understands.
pub const REQUEST_SCHEMA_VERSION: u32 = 2;

/// A value to write into a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(serde_json::Value),
    /// Sentinel: the store assigns its own timestamp at write time.
    ServerTimestamp,
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Value(v)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Value(serde_json::Value::String(s))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Value(serde_json::Value::String(s.to_string()))
    }
}

/// Fields for a document write.
pub type Fields = BTreeMap<String, FieldValue>;

/// A newly created donation request, as delivered by the trigger source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    /// Trigger-assigned id of the request document.
    pub request_id: String,
    #[serde(default)]
    pub donor_uid: Option<String>,
    #[serde(default)]
    pub receiver_name: Option<String>,
    #[serde(default)]
    pub receiver_uid: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
}

/// Request document body (schema v2). Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestFields {
    #[serde(default)]
    donor_uid: Option<String>,
    #[serde(default, deserialize_with = "display_text")]
    receiver_name: Option<String>,
    #[serde(default, deserialize_with = "display_text")]
    receiver_uid: Option<String>,
    #[serde(default, deserialize_with = "display_text")]
    item_name: Option<String>,
}

/// Display fields only end up in message text: numbers and booleans are
/// rendered as text, other non-string values are treated as absent.
fn display_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

impl RequestEvent {
    /// Decode a request document created under `requests/{request_id}`.
    pub fn from_document(request_id: &str, doc: &Document) -> Result<Self> {
        let body: RequestFields =
            serde_json::from_value(serde_json::Value::Object(doc.clone())).map_err(|e| {
                DonorLinkError::InvalidEvent(format!("request {request_id}: {e}"))
            })?;

        if body.donor_uid.is_none() && doc.contains_key(fields::LEGACY_DONOR_ID) {
            tracing::warn!(
                request_id,
                "⚠️ Request uses legacy '{}' field; schema v{} expects '{}'",
                fields::LEGACY_DONOR_ID,
                REQUEST_SCHEMA_VERSION,
                fields::DONOR_UID
            );
        }

        Ok(Self {
            request_id: request_id.to_string(),
            donor_uid: body.donor_uid,
            receiver_name: body.receiver_name,
            receiver_uid: body.receiver_uid,
            item_name: body.item_name,
        })
    }

    /// Donor uid when present and non-blank.
    pub fn donor_uid(&self) -> Option<&str> {
        non_blank(self.donor_uid.as_deref())
    }

    pub fn receiver_name(&self) -> Option<&str> {
        non_blank(self.receiver_name.as_deref())
    }

    pub fn item_name(&self) -> Option<&str> {
        non_blank(self.item_name.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Donor user record, read from the users collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRecord {
    pub uid: String,
    /// Push registration token. May be stale.
    #[serde(default)]
    pub fcm_token: Option<String>,
}

impl DonorRecord {
    pub fn from_document(uid: &str, doc: &Document) -> Self {
        let fcm_token = doc
            .get(fields::FCM_TOKEN)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        Self {
            uid: uid.to_string(),
            fcm_token,
        }
    }
}

/// In-app notification shown to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Store-assigned id; `None` until written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    pub to_uid: String,
    #[serde(default)]
    pub receiver_uid: String,
    pub request_id: String,
    /// Server-assigned; `None` until written.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Fields for the initial write, timestamp left to the store.
    pub fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert(fields::TITLE.into(), self.title.clone().into());
        f.insert(fields::MESSAGE.into(), self.message.clone().into());
        f.insert(fields::TO_UID.into(), self.to_uid.clone().into());
        f.insert(fields::RECEIVER_UID.into(), self.receiver_uid.clone().into());
        f.insert(fields::REQUEST_ID.into(), self.request_id.clone().into());
        f.insert(fields::TIMESTAMP.into(), FieldValue::ServerTimestamp);
        f
    }

    /// Read a stored notification back.
    pub fn from_document(id: &str, doc: &Document) -> Self {
        let text = |key: &str| {
            doc.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let timestamp = doc
            .get(fields::TIMESTAMP)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Self {
            id: Some(id.to_string()),
            title: text(fields::TITLE),
            message: text(fields::MESSAGE),
            to_uid: text(fields::TO_UID),
            receiver_uid: text(fields::RECEIVER_UID),
            request_id: text(fields::REQUEST_ID),
            timestamp,
        }
    }
}

/// Device push payload. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}
