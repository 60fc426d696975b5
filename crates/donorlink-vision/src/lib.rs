//! # DonorLink Vision
//!
//! Checks that an uploaded donation photo shows what the donor says it
//! shows. Independent of the notification pipeline.
//!
//! ```text
//! image bytes ──▶ ImageLabeler (external service) ──▶ [label, confidence]*
//!                                                          │
//!                          expected labels ──▶ LabelVerifier ──▶ VerificationReport
//! ```

pub mod labeler;
pub mod verifier;

pub use labeler::{HttpImageLabeler, ImageLabel, ImageLabeler};
pub use verifier::{LabelVerifier, VerificationReport};

use donorlink_core::error::Result;

/// Label an image and verify the labels in one call.
pub async fn verify_image(
    labeler: &dyn ImageLabeler,
    verifier: &LabelVerifier,
    image: &[u8],
) -> Result<VerificationReport> {
    let labels = labeler.label(image).await?;
    let report = verifier.verify(&labels);
    tracing::info!(
        verified = report.verified,
        labels = labels.len(),
        "🖼️ Donation image checked"
    );
    Ok(report)
}
