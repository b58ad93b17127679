//! Kolosal Churn - customer churn training and prediction
//!
//! This crate trains a binary churn classifier on tabular customer data and
//! serves it over HTTP:
//! - Loading and validating the Telco customer dataset
//! - Preprocessing: standard scaling and one-hot encoding
//! - Candidate models (logistic regression, random forest, gradient boosting)
//!   tuned by grid search under stratified cross-validation
//! - Selection of the best candidate by held-out ROC-AUC
//! - A single persisted artifact shared by the trainer and the service
//!
//! # Modules
//!
//! - [`data`] - Feature schema, customer records, CSV loading
//! - [`preprocessing`] - Scaler, encoder and the column transformer
//! - [`training`] - Algorithms, grid search, metrics and the training engine
//! - [`pipeline`] - Preprocessing + classifier as one unit
//! - [`artifact`] - Artifact persistence and verification
//! - [`inference`] - Churn predictor over a loaded artifact
//! - [`server`] - HTTP prediction service
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and models
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod pipeline;
pub mod artifact;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{ChurnError, Result};

/// Crate version, recorded in artifacts and reported by the service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ChurnError, Result};

    // Data
    pub use crate::data::{CustomerRecord, DataLoader, Dataset, FeatureSchema, FieldError};

    // Preprocessing
    pub use crate::preprocessing::{FeaturePreprocessor, OneHotEncoder, StandardScaler};

    // Training
    pub use crate::training::{
        select_best, CandidateSpec, ModelKind, ParamGrid, TrainEngine, TrainingConfig, TrainingReport,
    };

    // Artifact and inference
    pub use crate::artifact::{ArtifactMetadata, ChurnArtifact};
    pub use crate::inference::{ChurnPredictor, PredictError, Prediction};
    pub use crate::pipeline::ChurnPipeline;

    // Server
    pub use crate::server::{create_router, AppState, ServerConfig};
}
