//! BERT sequence classifier
//!
//! Mirrors Hugging Face's `BertForSequenceClassification`: BERT encoder, a
//! pooler (dense + tanh over the [CLS] hidden state) and a linear head
//! producing one logit per label.

use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use toxguard_core::{Error, Result};

use crate::classifier::{ClassificationResult, Classifier};
use crate::model_config::{Activation, ModelSpec};
use crate::model_loader::{self, HeadConfig, ModelFiles};

fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

/// BERT-family sequence classifier running on Candle
pub struct BertSequenceClassifier {
    name: String,
    inner: Arc<BertInner>,
}

struct BertInner {
    tokenizer: Tokenizer,
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    device: Device,
    labels: Vec<String>,
    activation: Activation,
}

impl BertSequenceClassifier {
    /// Resolve, download if needed, and load the model described by `spec`
    pub fn load(spec: &ModelSpec) -> Result<Self> {
        let name = spec.display_name();
        tracing::info!("Loading model '{}'", name);

        let files = ModelFiles::resolve(&spec.source)?;
        let device = model_loader::create_device(&spec.inference.device)?;

        let bert_config: BertConfig = model_loader::parse_json_config(&files.config)?;
        let head: HeadConfig = model_loader::parse_json_config(&files.config)?;
        let labels = model_loader::resolve_labels(&head, &spec.output.labels)?;

        let max_length = if spec.inference.max_length > bert_config.max_position_embeddings {
            tracing::warn!(
                "max_length {} exceeds the model's {} positions, clamping",
                spec.inference.max_length,
                bert_config.max_position_embeddings
            );
            bert_config.max_position_embeddings
        } else {
            spec.inference.max_length
        };
        let tokenizer = model_loader::load_tokenizer(&files, max_length)?;

        let vb = model_loader::load_var_builder(&files, &device)?;

        let classifier = Self::from_parts(
            name,
            tokenizer,
            vb,
            &bert_config,
            labels,
            spec.output.activation,
        )?;

        tracing::info!(
            "Successfully loaded BERT classifier '{}' with {} labels: {:?}",
            classifier.name,
            classifier.inner.labels.len(),
            classifier.inner.labels
        );

        Ok(classifier)
    }

    /// Assemble a classifier from an already configured tokenizer and weights
    pub fn from_parts(
        name: impl Into<String>,
        tokenizer: Tokenizer,
        vb: VarBuilder,
        config: &BertConfig,
        labels: Vec<String>,
        activation: Activation,
    ) -> Result<Self> {
        let device = vb.device().clone();
        let (model, backbone_vb) = load_backbone(&vb, config)?;

        let pooler = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            backbone_vb.pp("pooler").pp("dense"),
        )
        .map_err(|e| Error::model(format!("Failed to load pooler: {}", e)))?;

        let classifier = candle_nn::linear(config.hidden_size, labels.len(), vb.pp("classifier"))
            .map_err(|e| Error::model(format!("Failed to load classification head: {}", e)))?;

        Ok(Self {
            name: name.into(),
            inner: Arc::new(BertInner {
                tokenizer,
                model,
                pooler,
                classifier,
                device,
                labels,
                activation,
            }),
        })
    }

    /// Label names by output index
    pub fn labels(&self) -> &[String] {
        &self.inner.labels
    }
}

/// Checkpoints store the encoder under `bert.` or at the root
fn load_backbone<'a>(
    vb: &VarBuilder<'a>,
    config: &BertConfig,
) -> Result<(BertModel, VarBuilder<'a>)> {
    let mut errors = Vec::new();

    for prefix in ["bert", ""] {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };
        let effective_prefix = if prefix.is_empty() { "<root>" } else { prefix };

        match BertModel::load(vb_prefix.clone(), config) {
            Ok(model) => {
                tracing::debug!("Loaded BERT backbone from '{}'", effective_prefix);
                return Ok((model, vb_prefix));
            }
            Err(e) => errors.push(format!("{}: {}", effective_prefix, e)),
        }
    }

    Err(Error::model(format!(
        "Failed to load BERT backbone with tried prefixes [{}]",
        errors.join(" | ")
    )))
}

impl BertInner {
    fn scores(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create input tensor"))?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(candle_err("Failed to create token type tensor"))?;

        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(candle_err("Model forward pass failed"))?;

        let cls = hidden_states
            .i((.., 0))
            .map_err(candle_err("Failed to get CLS token"))?;

        let pooled = self
            .pooler
            .forward(&cls)
            .and_then(|t| t.tanh())
            .map_err(candle_err("Pooler failed"))?;

        let logits = self
            .classifier
            .forward(&pooled)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(candle_err("Classification head failed"))?;

        if logits.len() != self.labels.len() {
            return Err(Error::classifier(format!(
                "Model produced {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        Ok(self.activation.apply(&logits))
    }
}

#[async_trait]
impl Classifier for BertSequenceClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let inner = Arc::clone(&self.inner);
        let owned = text.to_owned();
        let probs = tokio::task::spawn_blocking(move || inner.scores(&owned))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))??;

        let all_scores = self.inner.labels.iter().cloned().zip(probs).collect();

        let mut result = ClassificationResult::from_scores(all_scores).with_model(&self.name);
        result.latency_us = start.elapsed().as_micros() as u64;
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
