//! # DonorLink Notify
//!
//! Reacts to newly created donation requests: tells the donor.
//!
//! ## Flow
//! ```text
//! Trigger (HTTP / CLI) ── RequestEvent ──▶ DispatchController
//!   ├── validate donorUid          (empty → REJECTED, nothing written)
//!   ├── users/{donorUid}           (missing → no push token)
//!   ├── compose title + message
//!   ├── notifications.add(...)     (failure → fatal, propagated)
//!   └── push to fcmToken           (failure → logged, never propagated)
//! ```
//!
//! Store backends: SQLite ([`SqliteRecordStore`]) or in-memory
//! ([`MemoryRecordStore`]). Push backends: FCM HTTP ([`FcmPushClient`]) or
//! log-only ([`LogPushClient`]).

pub mod compose;
pub mod dispatch;
pub mod fcm;
pub mod log_push;
pub mod memory;
pub mod persistence;

pub use compose::{NOTIFICATION_TITLE, compose};
pub use dispatch::{
    DispatchController, DispatchOutcome, DispatchReport, DispatchState, PushOutcome,
    RequestCreatedHandler, TriggerContext,
};
pub use fcm::FcmPushClient;
pub use log_push::LogPushClient;
pub use memory::MemoryRecordStore;
pub use persistence::SqliteRecordStore;

use donorlink_core::config::{DonorLinkConfig, PushConfig, StoreConfig};
use donorlink_core::error::{DonorLinkError, Result};
use donorlink_core::traits::{PushClient, RecordStore};
use std::sync::Arc;

/// Build the record store selected by config.
pub fn store_from_config(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryRecordStore::new())),
        "sqlite" => {
            let path = config.expanded_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SqliteRecordStore::open(&path)?))
        }
        other => Err(DonorLinkError::Config(format!("Unknown store backend: {other}"))),
    }
}

/// Build the push client selected by config.
pub fn push_from_config(config: &PushConfig) -> Result<Arc<dyn PushClient>> {
    match config.backend.as_str() {
        "log" => Ok(Arc::new(LogPushClient::new())),
        "fcm" => {
            if config.server_key.is_empty() {
                return Err(DonorLinkError::Config(
                    "push.backend = \"fcm\" requires a server key".into(),
                ));
            }
            Ok(Arc::new(FcmPushClient::new(config)?))
        }
        other => Err(DonorLinkError::Config(format!("Unknown push backend: {other}"))),
    }
}

/// Create the process-wide store and push clients once and wire them into
/// a controller.
pub fn controller_from_config(config: &DonorLinkConfig) -> Result<DispatchController> {
    let store = store_from_config(&config.store)?;
    let push = push_from_config(&config.push)?;
    tracing::info!(
        store = store.name(),
        push = push.name(),
        "🔧 Dispatch controller ready"
    );
    Ok(DispatchController::new(store, push, config.collections.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_from_config() {
        let config = StoreConfig {
            backend: "memory".into(),
            ..Default::default()
        };
        assert_eq!(store_from_config(&config).unwrap().name(), "memory");

        let bad = StoreConfig {
            backend: "redis".into(),
            ..Default::default()
        };
        assert!(store_from_config(&bad).is_err());
    }

    #[test]
    fn test_push_from_config() {
        let log = PushConfig::default();
        assert_eq!(push_from_config(&log).unwrap().name(), "log");

        let fcm_without_key = PushConfig {
            backend: "fcm".into(),
            ..Default::default()
        };
        assert!(push_from_config(&fcm_without_key).is_err());

        let fcm = PushConfig {
            backend: "fcm".into(),
            server_key: "key".into(),
            ..Default::default()
        };
        assert_eq!(push_from_config(&fcm).unwrap().name(), "fcm");
    }

    #[test]
    fn test_controller_from_config() {
        let mut config = DonorLinkConfig::default();
        config.store.backend = "memory".into();
        let controller = controller_from_config(&config).unwrap();
        assert_eq!(controller.store().name(), "memory");
        assert_eq!(controller.collections().users, "users");
    }
}
