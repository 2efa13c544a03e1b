//! Wire types for the moderation endpoint

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /moderate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRequest {
    /// Text to classify
    pub text: String,
}

impl ModerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Response of `POST /moderate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    /// False when the toxicity score exceeds the configured threshold
    pub is_approved: bool,

    /// `1 - P(safe label)`
    pub toxicity_score: f64,

    /// Score of every label the model emits
    #[serde(default)]
    pub details: BTreeMap<String, f64>,
}

impl ModerationResult {
    /// Result used when moderation is switched off: approved, zero score, no details
    pub fn approved_unchecked() -> Self {
        Self {
            is_approved: true,
            toxicity_score: 0.0,
            details: BTreeMap::new(),
        }
    }

    /// Labels other than `safe_label` scoring strictly above `min_score`,
    /// highest score first
    pub fn flagged_labels(&self, safe_label: &str, min_score: f64) -> Vec<(String, f64)> {
        let mut flagged: Vec<(String, f64)> = self
            .details
            .iter()
            .filter(|(label, score)| label.as_str() != safe_label && **score > min_score)
            .map(|(label, score)| (label.clone(), *score))
            .collect();

        flagged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        flagged
    }
}
