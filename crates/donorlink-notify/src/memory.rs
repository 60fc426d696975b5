//! In-memory record store. Same semantics as the SQLite store, nothing
//! survives a restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use donorlink_core::clock::ServerClock;
use donorlink_core::error::{DonorLinkError, Result};
use donorlink_core::traits::RecordStore;
use donorlink_core::traits::store::resolve_fields;
use donorlink_core::types::{Document, Fields};

/// `HashMap`-backed store; documents kept in insertion order per collection.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: Mutex<HashMap<String, Vec<(String, Document)>>>,
    clock: ServerClock,
    writes: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection, oldest first.
    pub fn documents(&self, collection: &str) -> Vec<(String, Document)> {
        self.collections
            .lock()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Number of successful `add`/`set` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<(String, Document)>>>> {
        self.collections
            .lock()
            .map_err(|_| DonorLinkError::Store("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| DonorLinkError::Persistence("memory store lock poisoned".into()))?;
        // Stamp under the lock so timestamps follow insertion order.
        let doc = resolve_fields(fields, self.clock.now());
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), doc));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| DonorLinkError::Persistence("memory store lock poisoned".into()))?;
        let patch = resolve_fields(fields, self.clock.now());
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(doc_id, _)| doc_id == id) {
            Some((_, doc)) => doc.extend(patch),
            None => docs.push((id.to_string(), patch)),
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<(String, Document)>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .rev()
                    .filter(|(_, doc)| doc.get(field).and_then(|v| v.as_str()) == Some(value))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donorlink_core::types::FieldValue;

    fn note(to: &str, n: u32) -> Fields {
        let mut f = Fields::new();
        f.insert("toUid".into(), to.into());
        f.insert("message".into(), format!("m{n}").into());
        f.insert("timestamp".into(), FieldValue::ServerTimestamp);
        f
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = MemoryRecordStore::new();
        let id = store.add("notifications", note("d1", 1)).await.unwrap();
        let doc = store.get("notifications", &id).await.unwrap().unwrap();
        assert_eq!(doc["toUid"], "d1");
        assert!(doc["timestamp"].is_string());
        assert!(store.get("notifications", "nope").await.unwrap().is_none());
        assert!(store.get("other", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_merges() {
        let store = MemoryRecordStore::new();
        let mut f = Fields::new();
        f.insert("name".into(), "Bob".into());
        store.set("users", "d1", f).await.unwrap();

        let mut f = Fields::new();
        f.insert("fcmToken".into(), "tok".into());
        store.set("users", "d1", f).await.unwrap();

        let doc = store.get("users", "d1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Bob");
        assert_eq!(doc["fcmToken"], "tok");
        assert_eq!(store.documents("users").len(), 1);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_find_by_newest_first() {
        let store = MemoryRecordStore::new();
        for n in 0..5 {
            store.add("notifications", note("d1", n)).await.unwrap();
        }
        store.add("notifications", note("d2", 9)).await.unwrap();

        let found = store.find_by("notifications", "toUid", "d1", 3).await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].1["message"], "m4");
        assert_eq!(found[2].1["message"], "m2");

        let ts: Vec<&str> = found.iter().map(|(_, d)| d["timestamp"].as_str().unwrap()).collect();
        assert!(ts[0] > ts[1] && ts[1] > ts[2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_keep_timestamp_order() {
        let store = std::sync::Arc::new(MemoryRecordStore::new());
        let tasks: Vec<_> = (0..64)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.add("notifications", note("d1", n)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let found = store.find_by("notifications", "toUid", "d1", 100).await.unwrap();
        assert_eq!(found.len(), 64);
        let ts: Vec<&str> = found.iter().map(|(_, d)| d["timestamp"].as_str().unwrap()).collect();
        assert!(ts.windows(2).all(|w| w[0] > w[1]));
    }
}
