//! Trait seams to the external collaborators.

pub mod push;
pub mod store;

pub use push::{DeliveryResult, PushClient};
pub use store::RecordStore;
