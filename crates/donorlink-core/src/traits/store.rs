//! Record store trait — document collections keyed by opaque ids.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::Result;
use crate::types::{Document, FieldValue, Fields};

/// Document store client.
///
/// Reads return `Store` errors, writes return `Persistence` errors.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Fetch a document. `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Append a new document and return its generated id.
    /// `FieldValue::ServerTimestamp` fields are resolved by the store.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Create or merge fields into the document with the given id.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Documents whose top-level `field` equals `value`, newest first.
    async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<(String, Document)>>;
}

/// Turn write fields into a stored document, stamping server timestamps.
pub fn resolve_fields(fields: Fields, now: DateTime<Utc>) -> Document {
    fields
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                FieldValue::Value(v) => v,
                FieldValue::ServerTimestamp => serde_json::Value::String(
                    now.to_rfc3339_opts(SecondsFormat::Micros, true),
                ),
            };
            (k, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_server_timestamp() {
        let now = Utc::now();
        let mut fields = Fields::new();
        fields.insert("title".into(), "hi".into());
        fields.insert("timestamp".into(), FieldValue::ServerTimestamp);

        let doc = resolve_fields(fields, now);
        assert_eq!(doc["title"], "hi");
        let ts = doc["timestamp"].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(ts).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
