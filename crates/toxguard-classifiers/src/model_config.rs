//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hugging Face repository of the default toxicity model
pub const DEFAULT_MODEL_REPO: &str = "cointegrated/rubert-tiny-toxicity";

/// Configuration for the classification model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name reported in results and logs; defaults to the source
    #[serde(default)]
    pub name: String,

    /// Model source (where to load from)
    #[serde(default)]
    pub source: ModelSource,

    /// Inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

impl ModelSpec {
    /// Name to report for this model
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match &self.source {
            ModelSource::HuggingFace { repo, .. } => repo.clone(),
            ModelSource::Local { path } => path.display().to_string(),
        }
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from a local directory holding `config.json`, tokenizer and weights
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::HuggingFace {
            repo: DEFAULT_MODEL_REPO.to_string(),
            revision: default_revision(),
        }
    }
}

fn default_revision() -> String {
    "main".to_string()
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Device to run on (cpu, cuda, cuda:N, metal, mps)
    #[serde(default = "default_device")]
    pub device: String,

    /// Maximum sequence length; longer inputs are truncated on the right
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_max_length() -> usize {
    512
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            max_length: default_max_length(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Function turning logits into scores
    #[serde(default)]
    pub activation: Activation,

    /// Label names by output index; when empty, `id2label` from the
    /// model's `config.json` is used
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Logit activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Independent per-label probability (multi-label models)
    #[default]
    Sigmoid,
    /// Probabilities summing to one (single-label models)
    Softmax,
}

impl Activation {
    /// Apply the activation to a vector of logits
    pub fn apply(&self, logits: &[f32]) -> Vec<f32> {
        match self {
            Self::Sigmoid => logits.iter().map(|x| 1.0 / (1.0 + (-x).exp())).collect(),
            Self::Softmax => {
                let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
                let sum: f32 = exps.iter().sum();
                if sum == 0.0 {
                    return exps;
                }
                exps.into_iter().map(|e| e / sum).collect()
            }
        }
    }
}
