//! toxguard Classifiers
//!
//! Text classification backed by pretrained Hugging Face models running on
//! Candle, plus the thresholding that turns per-label scores into a
//! moderation decision.
//!
//! The model is loaded once at startup ([`load_classifier`]) and shared
//! behind an `Arc<dyn Classifier>`; [`Moderator`] is pure and cheap.

pub mod bert;
pub mod classifier;
pub mod model_config;
pub mod model_loader;
pub mod moderation;

pub use bert::BertSequenceClassifier;
pub use classifier::{ClassificationResult, Classifier};
pub use model_config::{Activation, InferenceConfig, ModelSource, ModelSpec};
pub use model_loader::{load_classifier, ModelFiles};
pub use moderation::{ModerationSpec, Moderator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::model_config::ModelSpec;
    pub use crate::moderation::{ModerationSpec, Moderator};
}
