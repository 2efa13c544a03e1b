//! toxguard Server
//!
//! HTTP endpoint that classifies text for toxicity with a pretrained
//! sequence-classification model and answers with an approval decision and
//! per-label scores.
//!
//! The model is loaded before the listener binds; a model that cannot be
//! loaded stops the process.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod routes;
mod state;

use config::ServerConfig;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "toxguard-server")]
#[command(about = "Toxicity moderation endpoint", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TOXGUARD_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Listen address
    #[arg(short = 'l', long, env = "TOXGUARD_LISTEN")]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "TOXGUARD_PORT")]
    port: Option<u16>,

    /// Hugging Face model repository
    #[arg(long, env = "TOXGUARD_MODEL_REPO")]
    model_repo: Option<String>,

    /// Revision used with --model-repo
    #[arg(long, default_value = "main")]
    model_revision: String,

    /// Local model directory (takes precedence over --model-repo)
    #[arg(long, env = "TOXGUARD_MODEL_PATH")]
    model_path: Option<String>,

    /// Inference device (cpu, cuda, cuda:N, metal)
    #[arg(long, env = "TOXGUARD_DEVICE")]
    device: Option<String>,

    /// Toxicity score above which text is rejected
    #[arg(short, long, env = "TOXGUARD_THRESHOLD")]
    threshold: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    info!("Starting toxguard server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model: {}", config.model.display_name());
    info!("Device: {}", config.model.inference.device);
    info!(
        "Threshold: {} (safe label '{}')",
        config.moderation.threshold, config.moderation.safe_label
    );

    let metrics_handle = init_metrics()?;

    info!("Loading model...");
    let state = match AppState::new(config, metrics_handle).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            return Err(e);
        }
    };
    info!("Model ready");

    let addr: SocketAddr =
        format!("{}:{}", state.config.listen, state.config.port).parse()?;

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("toxguard=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toxguard=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "toxguard_requests_total",
        "Total number of moderation requests"
    );
    metrics::describe_counter!(
        "toxguard_decisions_total",
        "Moderation decisions by outcome"
    );
    metrics::describe_histogram!(
        "toxguard_inference_latency_us",
        metrics::Unit::Microseconds,
        "Model inference latency in microseconds"
    );
    metrics::describe_counter!("toxguard_errors_total", "Total number of errors by kind");

    info!("Metrics exporter initialized");
    Ok(handle)
}
