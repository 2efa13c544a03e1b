//! Toxicity thresholding
//!
//! Turns classifier scores into the approve/reject decision returned by the
//! `/moderate` endpoint.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toxguard_core::{Error, ModerationResult, Result};

use crate::classifier::{ClassificationResult, Classifier};

/// Thresholding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationSpec {
    /// Texts whose toxicity score exceeds this value are rejected
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Label whose score means "not toxic"
    #[serde(default = "default_safe_label")]
    pub safe_label: String,
}

fn default_threshold() -> f64 {
    0.75
}

fn default_safe_label() -> String {
    "non-toxic".to_string()
}

impl Default for ModerationSpec {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            safe_label: default_safe_label(),
        }
    }
}

impl ModerationSpec {
    /// Reject thresholds outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.safe_label.trim().is_empty() {
            return Err(Error::config("safe_label must not be empty"));
        }
        Ok(())
    }
}

/// Applies the toxicity threshold to a classifier's output
#[derive(Clone)]
pub struct Moderator {
    classifier: Arc<dyn Classifier>,
    spec: ModerationSpec,
}

impl Moderator {
    pub fn new(classifier: Arc<dyn Classifier>, spec: ModerationSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { classifier, spec })
    }

    pub fn spec(&self) -> &ModerationSpec {
        &self.spec
    }

    /// Name of the underlying classifier
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify `text` and decide whether it is approved
    pub async fn moderate(&self, text: &str) -> Result<(ModerationResult, ClassificationResult)> {
        let classification = self.classifier.classify(text).await?;
        let result = self.decide(&classification);
        Ok((result, classification))
    }

    /// Decision for an existing classification.
    ///
    /// `toxicity_score = 1 - score(safe_label)`, with a missing safe label
    /// scoring 0. The text is rejected only when the score is strictly
    /// greater than the threshold.
    pub fn decide(&self, classification: &ClassificationResult) -> ModerationResult {
        let details = classification
            .scores()
            .map(|(label, score)| (label.to_string(), f64::from(score)))
            .collect::<std::collections::BTreeMap<_, _>>();

        let safe_score = details.get(&self.spec.safe_label).copied().unwrap_or(0.0);
        let toxicity_score = 1.0 - safe_score;
        let is_toxic = toxicity_score > self.spec.threshold;

        ModerationResult {
            is_approved: !is_toxic,
            toxicity_score,
            details,
        }
    }
}
