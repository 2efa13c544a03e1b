//! Model resolution and loading for Candle-based classifiers
//!
//! A model directory is expected to follow the Hugging Face layout:
//! `config.json`, a tokenizer (`tokenizer.json` or `vocab.txt`) and weights
//! (`model.safetensors` or `pytorch_model.bin`).

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};
use toxguard_core::{Error, Result};

use crate::bert::BertSequenceClassifier;
use crate::classifier::Classifier;
use crate::model_config::{ModelSource, ModelSpec};

const TOKENIZER_FILES: [&str; 2] = ["tokenizer.json", "vocab.txt"];
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Load the configured classifier.
///
/// Downloading and deserializing weights is blocking work, so it runs on
/// tokio's blocking pool.
pub async fn load_classifier(spec: &ModelSpec) -> Result<Arc<dyn Classifier>> {
    let spec = spec.clone();
    let classifier = tokio::task::spawn_blocking(move || BertSequenceClassifier::load(&spec))
        .await
        .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))??;

    Ok(Arc::new(classifier))
}

/// Weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    /// SafeTensors format (memory mapped)
    SafeTensors,
    /// PyTorch pickle format
    PyTorch,
}

/// Tokenizer file kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerFormat {
    /// Serialized `tokenizers` pipeline
    Json,
    /// Plain WordPiece vocabulary
    Vocab,
}

/// Paths of the files making up one model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub tokenizer_format: TokenizerFormat,
    /// `tokenizer_config.json`, consulted when building from `vocab.txt`
    pub tokenizer_config: Option<PathBuf>,
    pub weights: PathBuf,
    pub weights_format: WeightsFormat,
}

impl ModelFiles {
    /// Resolve files for a source, downloading from the Hub when needed
    pub fn resolve(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local { path } => Self::from_dir(path),
            ModelSource::HuggingFace { repo, revision } => Self::download(repo, revision),
        }
    }

    /// Locate model files inside a local directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::model(format!(
                "Model path does not exist: {}",
                dir.display()
            )));
        }

        let config = dir.join("config.json");
        if !config.exists() {
            return Err(Error::model(format!(
                "config.json not found in {}",
                dir.display()
            )));
        }

        let (tokenizer, tokenizer_format) = TOKENIZER_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .map(|path| {
                let format = tokenizer_format_of(&path);
                (path, format)
            })
            .ok_or_else(|| {
                Error::model(format!(
                    "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
                    dir.display()
                ))
            })?;

        let (weights, weights_format) = WEIGHT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .map(|path| {
                let format = weights_format_of(&path);
                (path, format)
            })
            .ok_or_else(|| {
                Error::model(format!(
                    "No model weights found in {} (tried model.safetensors, pytorch_model.bin)",
                    dir.display()
                ))
            })?;

        let tokenizer_config = Some(dir.join(TOKENIZER_CONFIG_FILE)).filter(|path| path.exists());

        Ok(Self {
            config,
            tokenizer,
            tokenizer_format,
            tokenizer_config,
            weights,
            weights_format,
        })
    }

    fn download(repo: &str, revision: &str) -> Result<Self> {
        tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

        let api = Api::new()
            .map_err(|e| Error::model(format!("Failed to initialize HuggingFace API: {}", e)))?;
        let repo_obj = api.repo(Repo::with_revision(
            repo.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let config = repo_obj
            .get("config.json")
            .map_err(|e| Error::model(format!("Failed to download config.json: {}", e)))?;

        let tokenizer = first_available(&TOKENIZER_FILES, |name| repo_obj.get(name).ok())
            .ok_or_else(|| {
                Error::model(format!(
                    "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
                    repo
                ))
            })?;

        let tokenizer_config = first_available(&[TOKENIZER_CONFIG_FILE], |name| {
            repo_obj.get(name).ok()
        });

        let weights = first_available(&WEIGHT_FILES, |name| repo_obj.get(name).ok())
            .ok_or_else(|| {
                Error::model(format!(
                    "No model weights found in {} (tried model.safetensors, pytorch_model.bin)",
                    repo
                ))
            })?;

        tracing::info!("Model available at: {}", weights.display());

        Ok(Self {
            config,
            tokenizer_format: tokenizer_format_of(&tokenizer),
            tokenizer,
            tokenizer_config,
            weights_format: weights_format_of(&weights),
            weights,
        })
    }
}

fn first_available(
    names: &[&str],
    mut fetch: impl FnMut(&str) -> Option<PathBuf>,
) -> Option<PathBuf> {
    names.iter().find_map(|name| {
        let found = fetch(name);
        if found.is_none() {
            tracing::debug!("File not found: {}", name);
        }
        found
    })
}

fn tokenizer_format_of(path: &Path) -> TokenizerFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => TokenizerFormat::Json,
        _ => TokenizerFormat::Vocab,
    }
}

fn weights_format_of(path: &Path) -> WeightsFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("safetensors") => WeightsFormat::SafeTensors,
        _ => WeightsFormat::PyTorch,
    }
}

/// Create a Candle device from its configured name
pub fn create_device(device: &str) -> Result<Device> {
    let device = device.trim().to_lowercase();
    let (kind, index) = match device.split_once(':') {
        Some((kind, index)) => {
            let index = index
                .parse::<usize>()
                .map_err(|_| Error::config(format!("Invalid device index in '{}'", device)))?;
            (kind, index)
        }
        None => (device.as_str(), 0),
    };

    match kind {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(index)
            .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
        "metal" | "mps" => Device::new_metal(index)
            .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        other => Err(Error::config(format!("Unknown device '{}'", other))),
    }
}

/// Parse a JSON config file into `T`
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::model(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::model(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Classification-head fields of a Hugging Face `config.json`
#[derive(Debug, Default, Deserialize)]
pub struct HeadConfig {
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub num_labels: Option<usize>,
}

/// Work out label names by output index.
///
/// `id2label` keys are numeric strings below the declared label count
/// (`num_labels`, or the number of `id2label` entries). Explicit `overrides`
/// win, and any index left without a name becomes `label_<i>`.
pub fn resolve_labels(head: &HeadConfig, overrides: &[String]) -> Result<Vec<String>> {
    let declared = head.num_labels.unwrap_or(head.id2label.len());

    let mut by_id = Vec::with_capacity(head.id2label.len());
    for (id, label) in &head.id2label {
        let idx = id
            .parse::<usize>()
            .map_err(|_| Error::model(format!("Non-numeric id2label key '{}'", id)))?;
        if idx >= declared {
            return Err(Error::model(format!(
                "id2label key {} is out of range for {} labels",
                idx, declared
            )));
        }
        by_id.push((idx, label.clone()));
    }

    let num_labels = declared.max(overrides.len());

    if num_labels == 0 {
        return Err(Error::model(
            "Model config declares no labels (missing id2label and num_labels)",
        ));
    }

    let mut labels: Vec<String> = (0..num_labels).map(|idx| format!("label_{}", idx)).collect();
    for (id, label) in by_id {
        labels[id] = label;
    }
    for (idx, label) in overrides.iter().enumerate() {
        labels[idx] = label.clone();
    }

    Ok(labels)
}

/// Load a tokenizer, truncating on the right at `max_length` tokens
pub fn load_tokenizer(files: &ModelFiles, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = match files.tokenizer_format {
        TokenizerFormat::Json => {
            tracing::debug!("Loading tokenizer from tokenizer.json");
            Tokenizer::from_file(&files.tokenizer)
                .map_err(|e| Error::model(format!("Failed to load tokenizer.json: {}", e)))?
        }
        TokenizerFormat::Vocab => {
            tracing::debug!("Building tokenizer from vocab.txt");
            let settings = match &files.tokenizer_config {
                Some(path) => parse_json_config(path)?,
                None => WordPieceSettings::default(),
            };
            wordpiece_tokenizer(&files.tokenizer, &settings)?
        }
    };

    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::model(format!("Failed to configure truncation: {}", e)))?;

    Ok(tokenizer)
}

/// Normalization flags read from `tokenizer_config.json`.
///
/// Defaults match an uncased BERT tokenizer.
#[derive(Debug, Clone, Deserialize)]
pub struct WordPieceSettings {
    #[serde(default = "default_true")]
    pub do_lower_case: bool,
    /// `None` strips accents whenever text is lowercased
    #[serde(default)]
    pub strip_accents: Option<bool>,
    #[serde(default = "default_true")]
    pub tokenize_chinese_chars: bool,
}

impl Default for WordPieceSettings {
    fn default() -> Self {
        Self {
            do_lower_case: true,
            strip_accents: None,
            tokenize_chinese_chars: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn wordpiece_tokenizer(vocab_path: &Path, settings: &WordPieceSettings) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::normalizers::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::processors::bert::BertProcessing;
    use tokenizers::Model;

    let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| Error::model(format!("Failed to build WordPiece model: {}", e)))?;

    let special = |token: &str| {
        wordpiece
            .token_to_id(token)
            .map(|id| (token.to_string(), id))
            .ok_or_else(|| Error::model(format!("Vocabulary is missing {}", token)))
    };
    let sep = special("[SEP]")?;
    let cls = special("[CLS]")?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::new(
        true,
        settings.tokenize_chinese_chars,
        settings.strip_accents,
        settings.do_lower_case,
    )));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

    Ok(tokenizer)
}

/// Build a `VarBuilder` over the model weights
pub fn load_var_builder(files: &ModelFiles, device: &Device) -> Result<VarBuilder<'static>> {
    match files.weights_format {
        WeightsFormat::SafeTensors => {
            // SAFETY: the weights file is not modified while the model is alive.
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, device)
                    .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))
            }
        }
        WeightsFormat::PyTorch => VarBuilder::from_pth(&files.weights, DType::F32, device)
            .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e))),
    }
}
