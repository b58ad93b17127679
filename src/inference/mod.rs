//! Prediction over a trained artifact
//!
//! The predictor validates raw payloads against the pinned feature schema,
//! runs the fitted pipeline and applies the decision threshold stored with
//! the artifact.

mod predictor;

pub use predictor::{ChurnPredictor, PredictError, Prediction};
