//! Gradient Boosting implementation
//!
//! Binary log-loss boosting over regression trees. Each round fits a tree
//! to the residuals `y - p` and replaces its leaf values with a single
//! Newton step `sum(r) / sum(p * (1 - p))` over the samples in the leaf.

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::linear_models::sigmoid;
use crate::error::{ChurnError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting binary classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    /// Prior log-odds of the positive class
    initial_prediction: f64,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        let invalid = |name: &str, value: String, reason: &str| ChurnError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if c.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if !(c.learning_rate > 0.0 && c.learning_rate.is_finite()) {
            return Err(invalid("learning_rate", c.learning_rate.to_string(), "must be positive"));
        }
        if !(c.subsample > 0.0 && c.subsample <= 1.0) {
            return Err(invalid("subsample", c.subsample.to_string(), "must be in (0, 1]"));
        }
        Ok(())
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ChurnError::TrainingError("cannot fit on zero samples".to_string()));
        }
        self.validate_config()?;

        // Prior log-odds, clipped so a one-class sample stays finite
        let prior = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_prediction = (prior / (1.0 - prior)).ln();
        self.trees.clear();

        let mut raw = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state.unwrap_or(42));

        for _ in 0..self.config.n_estimators {
            let prob = raw.mapv(sigmoid);
            let residuals = y - &prob;
            let hessian = prob.mapv(|p| p * (1.0 - p));

            let rows = self.subsample_indices(n_samples, &mut rng);
            let (x_fit, r_fit, h_fit) = if rows.len() == n_samples {
                (x.to_owned(), residuals, hessian)
            } else {
                (
                    x.select(Axis(0), &rows),
                    rows.iter().map(|&i| residuals[i]).collect(),
                    rows.iter().map(|&i| hessian[i]).collect::<Array1<f64>>(),
                )
            };

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_split(self.config.min_samples_split)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_with_leaf_values(&x_fit, &r_fit, |leaf| {
                let num: f64 = leaf.iter().map(|&i| r_fit[i]).sum();
                let den: f64 = leaf.iter().map(|&i| h_fit[i]).sum();
                if den.abs() < 1e-150 {
                    0.0
                } else {
                    num / den
                }
            })?;

            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }

        Ok(self)
    }

    fn subsample_indices(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    /// Raw log-odds scores
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ChurnError::ModelNotFitted);
        }
        let mut raw = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            raw.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(raw)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Class predictions at 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}
