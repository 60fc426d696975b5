//! Error types for DonorLink.

use thiserror::Error;

/// Errors surfaced by DonorLink crates.
#[derive(Debug, Error)]
pub enum DonorLinkError {
    #[error("Config error: {0}")]
    Config(String),

    /// Reading from the record store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Writing a record failed. Fatal for a dispatch.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Push transport could not complete the request.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Vision error: {0}")]
    Vision(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DonorLinkError>;
