//! Classifier trait and common types

use async_trait::async_trait;
use toxguard_core::Result;

/// Trait for all classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Highest scoring label
    pub label: String,

    /// Score of `label` (0.0-1.0)
    pub score: f32,

    /// Score of every label, in the model's label order
    pub all_scores: Vec<(String, f32)>,

    /// Model name or version
    pub model: Option<String>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Build a result from per-label scores; the top label is picked here
    pub fn from_scores(all_scores: Vec<(String, f32)>) -> Self {
        let (label, score) = all_scores
            .iter()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(label, score)| (label.clone(), *score))
            .unwrap_or_else(|| (String::new(), 0.0));

        Self {
            label,
            score,
            all_scores,
            model: None,
            latency_us: 0,
        }
    }

    /// Attach the producing model's name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Score for a given label, if the model emits it
    pub fn score_for(&self, label: &str) -> Option<f32> {
        self.all_scores
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, score)| *score)
    }

    /// Iterate over `(label, score)` pairs
    pub fn scores(&self) -> impl Iterator<Item = (&str, f32)> {
        self.all_scores.iter().map(|(label, score)| (label.as_str(), *score))
    }
}
