//! Churn predictor backed by a loaded artifact

use crate::artifact::{ArtifactMetadata, ChurnArtifact};
use crate::data::{CustomerRecord, FeatureSchema, FieldError};
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Prediction for a single customer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when the customer is predicted to churn
    pub churn_prediction: u8,
    /// Churn probability rounded to 4 decimals
    pub churn_probability: f64,
}

/// Failure while predicting from an untyped payload
#[derive(Debug, Error)]
pub enum PredictError {
    /// The payload does not match the feature schema
    #[error("invalid input: {0}")]
    Validation(#[from] FieldError),

    #[error(transparent)]
    Internal(#[from] ChurnError),
}

fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

/// Read-only predictor shared across request handlers.
///
/// Cloning is cheap; every clone points at the same artifact.
#[derive(Debug, Clone)]
pub struct ChurnPredictor {
    artifact: Arc<ChurnArtifact>,
    threshold: f64,
}

impl ChurnPredictor {
    pub fn new(artifact: ChurnArtifact) -> Result<Self> {
        artifact.verify(&artifact.schema)?;
        let threshold = artifact.metadata.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ChurnError::ArtifactError(format!(
                "artifact threshold {} is outside [0, 1]",
                threshold
            )));
        }
        Ok(Self {
            artifact: Arc::new(artifact),
            threshold,
        })
    }

    /// Load and verify an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(ChurnArtifact::load(path)?)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.artifact.schema
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.artifact.metadata
    }

    pub fn artifact(&self) -> &ChurnArtifact {
        &self.artifact
    }

    fn to_prediction(&self, probability: f64) -> Result<Prediction> {
        if !probability.is_finite() {
            return Err(ChurnError::InferenceError(format!(
                "model produced a non-finite probability: {}",
                probability
            )));
        }
        let churn_probability = round4(probability.clamp(0.0, 1.0));
        Ok(Prediction {
            churn_prediction: u8::from(churn_probability >= self.threshold),
            churn_probability,
        })
    }

    /// Predict churn for one validated record
    pub fn predict(&self, record: &CustomerRecord) -> Result<Prediction> {
        let proba = self.artifact.pipeline.predict_proba(std::slice::from_ref(record))?;
        let p = proba
            .first()
            .copied()
            .ok_or_else(|| ChurnError::InferenceError("model returned no output".to_string()))?;
        self.to_prediction(p)
    }

    /// Validate a JSON payload against the schema, then predict
    pub fn predict_json(&self, payload: &Value, strict: bool) -> std::result::Result<Prediction, PredictError> {
        let record = CustomerRecord::from_json(payload, self.schema(), strict)?;
        let prediction = self.predict(&record)?;
        debug!(
            churn_probability = prediction.churn_probability,
            churn_prediction = prediction.churn_prediction,
            "Prediction"
        );
        Ok(prediction)
    }

    /// Predict churn for many records in one pass
    pub fn predict_batch(&self, records: &[CustomerRecord]) -> Result<Vec<Prediction>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let proba = self.artifact.pipeline.predict_proba(records)?;
        proba.iter().map(|&p| self.to_prediction(p)).collect()
    }
}
