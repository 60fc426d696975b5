//! DonorLink gateway — HTTP surface for triggers and the mobile app.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
