//! Training configuration

use super::grid_search::ParamGrid;
use super::models::ModelKind;
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One candidate algorithm and the grid searched for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub kind: ModelKind,
    pub grid: ParamGrid,
}

impl CandidateSpec {
    pub fn new(kind: ModelKind, grid: ParamGrid) -> Self {
        Self { kind, grid }
    }

    /// Candidate with its default grid
    pub fn with_default_grid(kind: ModelKind) -> Self {
        Self::new(kind, kind.default_grid())
    }
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labeled dataset (CSV)
    pub data_path: PathBuf,

    /// Where the trained artifact is written
    pub artifact_path: PathBuf,

    /// Fraction of rows held out for the final test evaluation
    pub test_size: f64,

    /// Cross-validation folds used by the grid search
    pub cv_folds: usize,

    /// Seed for the split and every randomized model
    pub random_seed: u64,

    /// Probability at or above which a customer is predicted to churn
    pub threshold: f64,

    /// Candidate algorithms, in evaluation order
    pub candidates: Vec<CandidateSpec>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/Telco-Customer-Churn.csv"),
            artifact_path: PathBuf::from("churn_model.json"),
            test_size: 0.2,
            cv_folds: 5,
            random_seed: 42,
            threshold: 0.5,
            candidates: ModelKind::ALL.into_iter().map(CandidateSpec::with_default_grid).collect(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateSpec>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Check ranges before any work is done
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ChurnError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size", self.test_size.to_string(), "must be strictly between 0 and 1"));
        }
        if self.cv_folds < 2 {
            return Err(invalid("cv_folds", self.cv_folds.to_string(), "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(invalid("threshold", self.threshold.to_string(), "must be within [0, 1]"));
        }
        if self.candidates.is_empty() {
            return Err(invalid("candidates", "[]".to_string(), "at least one candidate is required"));
        }
        for (i, c) in self.candidates.iter().enumerate() {
            if self.candidates[..i].iter().any(|prev| prev.kind == c.kind) {
                return Err(invalid("candidates", c.kind.to_string(), "listed more than once"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.threshold, 0.5);
        let kinds: Vec<ModelKind> = config.candidates.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(TrainingConfig::default().with_test_size(0.0).validate().is_err());
        assert!(TrainingConfig::default().with_cv_folds(1).validate().is_err());
        assert!(TrainingConfig::default().with_threshold(1.5).validate().is_err());
        assert!(TrainingConfig::default().with_candidates(vec![]).validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = TrainingConfig::default().with_random_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.random_seed, 7);
        assert_eq!(back.candidates, config.candidates);
    }
}
