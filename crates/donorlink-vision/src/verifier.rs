//! Label verification — does the image show an expected item?

use serde::Serialize;

use crate::labeler::ImageLabel;

/// Outcome of checking labels against the expected set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub verified: bool,
    /// Confident labels that matched, best first.
    pub matched: Vec<ImageLabel>,
    pub best_match: Option<ImageLabel>,
    /// Labels below the confidence threshold, ignored.
    pub ignored: usize,
}

/// Matches labels case-insensitively against an expected set.
#[derive(Debug, Clone)]
pub struct LabelVerifier {
    expected: Vec<String>,
    min_confidence: f32,
}

impl LabelVerifier {
    pub fn new<I, S>(expected: I, min_confidence: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            expected: expected
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
            min_confidence,
        }
    }

    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    pub fn verify(&self, labels: &[ImageLabel]) -> VerificationReport {
        let (confident, weak): (Vec<&ImageLabel>, Vec<&ImageLabel>) = labels
            .iter()
            .partition(|l| l.confidence >= self.min_confidence);

        let mut matched: Vec<ImageLabel> = confident
            .into_iter()
            .filter(|l| self.expected.contains(&normalize(&l.text)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        VerificationReport {
            verified: !matched.is_empty(),
            best_match: matched.first().cloned(),
            matched,
            ignored: weak.len(),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
