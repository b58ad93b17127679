//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Uri,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::inference::Prediction;

use super::error::{Result, ServerError};
use super::state::AppState;

const SERVICE_NAME: &str = "Customer Churn Prediction API";

/// Liveness probe; the body never depends on request or model state
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "operational",
        "service": SERVICE_NAME,
        "version": crate::VERSION,
    }))
}

/// Metadata of the served artifact
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let predictor = &state.predictor;
    let meta = predictor.metadata();
    Json(json!({
        "model_name": meta.model_name,
        "params": meta.params,
        "cv_roc_auc": meta.cv_roc_auc,
        "test_roc_auc": meta.test_roc_auc,
        "candidate_scores": meta.candidate_scores,
        "trained_at": meta.trained_at,
        "n_train": meta.n_train,
        "n_test": meta.n_test,
        "threshold": predictor.threshold(),
        "feature_columns": predictor.schema().column_names(),
        "feature_names": meta.feature_names,
        "format_version": predictor.artifact().format_version,
        "crate_version": meta.crate_version,
    }))
}

/// Predict churn for one customer
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Prediction>> {
    let Json(payload) = payload.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;
    let prediction = state
        .predictor
        .predict_json(&payload, state.config.strict_categories)
        .map_err(|e| {
            info!(error = %e, "Rejected prediction request");
            ServerError::from(e)
        })?;
    Ok(Json(prediction))
}

pub async fn handle_404(uri: Uri) -> ServerError {
    ServerError::NotFound(format!("no route for {}", uri.path()))
}

pub async fn handle_405() -> ServerError {
    ServerError::MethodNotAllowed
}
