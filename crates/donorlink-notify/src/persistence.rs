//! SQLite-backed record store.
//! One `documents` table holds every collection; bodies are JSON text.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;

use donorlink_core::clock::ServerClock;
use donorlink_core::error::{DonorLinkError, Result};
use donorlink_core::traits::RecordStore;
use donorlink_core::traits::store::resolve_fields;
use donorlink_core::types::{Document, Fields};

/// SQLite document store.
pub struct SqliteRecordStore {
    conn: Mutex<rusqlite::Connection>,
    clock: ServerClock,
}

impl SqliteRecordStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| DonorLinkError::Store(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
            clock: ServerClock::new(),
        };
        store.migrate()?;
        tracing::debug!("💾 Record store opened at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,              -- JSON object
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection
                ON documents (collection, seq);
         ",
            )
            .map_err(|e| DonorLinkError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|_| DonorLinkError::Store("connection lock poisoned".into()))
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                [collection],
                |row| row.get(0),
            )
            .map_err(|e| DonorLinkError::Store(format!("Count: {e}")))?;
        Ok(n as usize)
    }
}

fn parse_doc(data: &str) -> Result<Document> {
    match serde_json::from_str::<serde_json::Value>(data)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(DonorLinkError::Store("stored document is not an object".into())),
    }
}

/// JSON path for a top-level field, quoted so any key is safe.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let data: Option<String> = self
            .conn()?
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DonorLinkError::Store(format!("Get {collection}/{id}: {e}")))?;
        data.as_deref().map(parse_doc).transpose()
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let conn = self
            .conn()
            .map_err(|e| DonorLinkError::Persistence(e.to_string()))?;
        // Stamp under the connection lock so timestamps follow `seq`.
        let doc = resolve_fields(fields, self.clock.now());
        let data = serde_json::Value::Object(doc).to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![collection, id, data, now],
        )
        .map_err(|e| DonorLinkError::Persistence(format!("Add to {collection}: {e}")))?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let conn = self
            .conn()
            .map_err(|e| DonorLinkError::Persistence(e.to_string()))?;
        let patch = resolve_fields(fields, self.clock.now());
        let now = Utc::now().to_rfc3339();

        let existing: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DonorLinkError::Persistence(format!("Set {collection}/{id}: {e}")))?;

        let mut doc = match existing {
            Some(data) => parse_doc(&data)?,
            None => Document::new(),
        };
        doc.extend(patch);
        let data = serde_json::Value::Object(doc).to_string();

        conn.execute(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            rusqlite::params![collection, id, data, now],
        )
        .map_err(|e| DonorLinkError::Persistence(format!("Set {collection}/{id}: {e}")))?;
        Ok(())
    }

    async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<(String, Document)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, data FROM documents
                 WHERE collection = ?1 AND json_extract(data, ?2) = ?3
                 ORDER BY seq DESC LIMIT ?4",
            )
            .map_err(|e| DonorLinkError::Store(format!("Find in {collection}: {e}")))?;

        let rows = stmt
            .query_map(
                rusqlite::params![collection, json_path(field), value, limit as i64],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|e| DonorLinkError::Store(format!("Find in {collection}: {e}")))?;

        let mut found = Vec::new();
        for row in rows {
            let (id, data) =
                row.map_err(|e| DonorLinkError::Store(format!("Find in {collection}: {e}")))?;
            found.push((id, parse_doc(&data)?));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donorlink_core::types::FieldValue;

    fn note(to: &str, message: &str) -> Fields {
        let mut f = Fields::new();
        f.insert("toUid".into(), to.into());
        f.insert("message".into(), message.into());
        f.insert("timestamp".into(), FieldValue::ServerTimestamp);
        f
    }

    #[tokio::test]
    async fn test_open_and_migrate() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        assert_eq!(store.count("notifications").unwrap(), 0);
        assert!(store.get("users", "d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let id = store.add("notifications", note("d1", "hello")).await.unwrap();

        let doc = store.get("notifications", &id).await.unwrap().unwrap();
        assert_eq!(doc["toUid"], "d1");
        assert_eq!(doc["message"], "hello");
        assert!(doc["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(store.count("notifications").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_upserts_and_merges() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let mut f = Fields::new();
        f.insert("name".into(), "Bob".into());
        store.set("users", "d1", f).await.unwrap();

        let mut f = Fields::new();
        f.insert("fcmToken".into(), "tok123".into());
        store.set("users", "d1", f).await.unwrap();

        let doc = store.get("users", "d1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Bob");
        assert_eq!(doc["fcmToken"], "tok123");
        assert_eq!(store.count("users").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_filters_and_orders() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store.add("notifications", note("d1", "first")).await.unwrap();
        store.add("notifications", note("d2", "other")).await.unwrap();
        store.add("notifications", note("d1", "second")).await.unwrap();

        let found = store.find_by("notifications", "toUid", "d1", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1["message"], "second");
        assert_eq!(found[1].1["message"], "first");

        let limited = store.find_by("notifications", "toUid", "d1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = std::env::temp_dir().join("donorlink-store-test");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("store.db");
        std::fs::remove_file(&path).ok();

        let id = {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.add("notifications", note("d1", "kept")).await.unwrap()
        };
        let store = SqliteRecordStore::open(&path).unwrap();
        let doc = store.get("notifications", &id).await.unwrap().unwrap();
        assert_eq!(doc["message"], "kept");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_keep_timestamp_order() {
        let store = std::sync::Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        let tasks: Vec<_> = (0..32)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.add("notifications", note("d1", &format!("m{n}"))).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let found = store.find_by("notifications", "toUid", "d1", 100).await.unwrap();
        assert_eq!(found.len(), 32);
        let ts: Vec<&str> = found.iter().map(|(_, d)| d["timestamp"].as_str().unwrap()).collect();
        assert!(ts.windows(2).all(|w| w[0] > w[1]));
    }
}
