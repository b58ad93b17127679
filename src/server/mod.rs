//! Churn prediction service
//!
//! A small HTTP API over a single trained artifact: liveness, model
//! metadata and schema-validated predictions.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use crate::inference::ChurnPredictor;
use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Trained artifact served by this process
    pub model_path: PathBuf,
    /// Reject categorical values outside the declared vocabulary
    pub strict_categories: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("churn_model.json")),
            strict_categories: true,
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_strict_categories(mut self, strict: bool) -> Self {
        self.strict_categories = strict;
        self
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Load the artifact, then serve until ctrl+c.
///
/// The artifact is loaded before the listener is bound, so a missing or
/// incompatible model stops the process before it accepts any request.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let predictor = ChurnPredictor::load(&config.model_path)
        .with_context(|| format!("failed to load model from {}", config.model_path.display()))?;
    let meta = predictor.metadata();
    info!(
        model = %meta.model_name,
        test_roc_auc = meta.test_roc_auc,
        trained_at = %meta.trained_at,
        threshold = predictor.threshold(),
        strict_categories = config.strict_categories,
        "Model ready"
    );

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(predictor, config));
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_state = Arc::clone(&state);
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        info!(
            uptime_secs = shutdown_state.uptime_secs(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
