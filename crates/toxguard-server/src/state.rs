//! Application state shared across requests

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use toxguard_classifiers::{load_classifier, Classifier, Moderator};
use tracing::info;

use crate::config::ServerConfig;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Classifier plus threshold
    pub moderator: Moderator,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Load the configured model and build the state around it
    pub async fn new(config: ServerConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        let classifier = load_classifier(&config.model).await?;
        info!("Loaded classifier '{}'", classifier.name());

        Self::with_classifier(config, classifier, metrics_handle)
    }

    /// Build the state around an already loaded classifier
    pub fn with_classifier(
        config: ServerConfig,
        classifier: Arc<dyn Classifier>,
        metrics_handle: PrometheusHandle,
    ) -> Result<Self> {
        let moderator = Moderator::new(classifier, config.moderation.clone())?;

        Ok(Self {
            config: Arc::new(config),
            moderator,
            metrics_handle,
        })
    }
}
