//! # DonorLink Core
//!
//! Shared building blocks for the notification dispatch pipeline and the
//! donation image verification pipeline.
//!
//! - [`types`] — request events, donor/notification records, push payloads
//! - [`traits`] — seams to the record store and the push transport
//! - [`config`] — TOML configuration with defaults for every field
//! - [`error`] — the workspace error type

pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::ServerClock;
pub use config::DonorLinkConfig;
pub use error::{DonorLinkError, Result};
