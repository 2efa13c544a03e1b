//! Server configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use toxguard_classifiers::{ModelSource, ModelSpec, ModerationSpec};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Classification model
    #[serde(default)]
    pub model: ModelSpec,

    /// Toxicity threshold settings
    #[serde(default)]
    pub moderation: ModerationSpec,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path))?
        } else {
            Self::default()
        };

        config.apply_overrides(cli);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply_overrides(&mut self, cli: &crate::Cli) {
        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            self.port = port;
        }

        if let Some(path) = &cli.model_path {
            self.model.source = ModelSource::Local { path: path.into() };
        } else if let Some(repo) = &cli.model_repo {
            self.model.source = ModelSource::HuggingFace {
                repo: repo.clone(),
                revision: cli.model_revision.clone(),
            };
        }

        if let Some(device) = &cli.device {
            self.model.inference.device = device.clone();
        }

        if let Some(threshold) = cli.threshold {
            self.moderation.threshold = threshold;
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> anyhow::Result<()> {
        self.moderation.validate()?;

        if self.model.inference.max_length < 2 {
            anyhow::bail!("model.inference.max_length must leave room for special tokens");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be positive");
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            model: ModelSpec::default(),
            moderation: ModerationSpec::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}
