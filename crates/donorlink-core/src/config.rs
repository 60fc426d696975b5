//! DonorLink configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DonorLinkError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DonorLinkConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

impl DonorLinkConfig {
    /// Load config from `DONORLINK_CONFIG` or the default path
    /// (~/.donorlink/config.toml). Missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var("DONORLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DonorLinkError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DonorLinkError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DonorLinkError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the DonorLink home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".donorlink")
    }

    /// Apply secrets from the environment over file values.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("DONORLINK_FCM_SERVER_KEY") {
            if !key.is_empty() {
                self.push.server_key = key;
            }
        }
        if let Ok(key) = std::env::var("DONORLINK_VISION_API_KEY") {
            if !key.is_empty() {
                self.vision.api_key = key;
            }
        }
    }
}

fn bool_true() -> bool { true }

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String { "sqlite".into() }
fn default_store_path() -> String { "~/.donorlink/donorlink.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// Store path with `~` expanded.
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Collection names in the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_users")]
    pub users: String,
    #[serde(default = "default_notifications")]
    pub notifications: String,
}

fn default_users() -> String { "users".into() }
fn default_notifications() -> String { "notifications".into() }

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            notifications: default_notifications(),
        }
    }
}

/// Push delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// "fcm" or "log".
    #[serde(default = "default_push_backend")]
    pub backend: String,
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    /// FCM server key. Prefer DONORLINK_FCM_SERVER_KEY.
    #[serde(default)]
    pub server_key: String,
    #[serde(default = "default_push_timeout")]
    pub timeout_secs: u64,
}

fn default_push_backend() -> String { "log".into() }
fn default_fcm_endpoint() -> String { "https://fcm.googleapis.com/fcm/send".into() }
fn default_push_timeout() -> u64 { 10 }

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            backend: default_push_backend(),
            endpoint: default_fcm_endpoint(),
            server_key: String::new(),
            timeout_secs: default_push_timeout(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Donation image verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Labeling service URL.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_expected_labels")]
    pub expected_labels: Vec<String>,
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
}

fn default_min_confidence() -> f32 { 0.6 }
fn default_expected_labels() -> Vec<String> {
    vec!["wheelchair", "crutch", "walker", "hospital bed", "medical equipment"]
        .into_iter().map(String::from).collect()
}
fn default_vision_timeout() -> u64 { 15 }

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            api_key: String::new(),
            min_confidence: default_min_confidence(),
            expected_labels: default_expected_labels(),
            timeout_secs: default_vision_timeout(),
        }
    }
}
