//! Candidate model kinds, the fitted classifier enum and summary metrics

use super::grid_search::{ParamGrid, ParamValue, TrialParams};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::metrics::{log_loss, roc_auc_score, ClassificationReport};
use super::random_forest::RandomForest;
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metrics for model evaluation, positive class = churn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc_roc: f64,
    pub log_loss: f64,
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute metrics from probabilities, thresholding at `threshold`
    pub fn compute(y_true: &Array1<f64>, y_prob: &Array1<f64>, threshold: f64) -> Result<Self> {
        let y_pred = y_prob.mapv(|p| if p >= threshold { 1.0 } else { 0.0 });
        let report = ClassificationReport::compute(y_true, &y_pred)?;
        let positive = report.classes[1];
        Ok(Self {
            accuracy: report.accuracy,
            precision: positive.precision,
            recall: positive.recall,
            f1_score: positive.f1_score,
            auc_roc: roc_auc_score(y_true, y_prob)?,
            log_loss: log_loss(y_true, y_prob)?,
            n_samples: y_true.len(),
        })
    }
}

/// Candidate algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logreg,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Logreg, ModelKind::RandomForest, ModelKind::GradientBoosting];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Logreg => "logreg",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Hyperparameter grid searched for this kind by default
    pub fn default_grid(&self) -> ParamGrid {
        match self {
            ModelKind::Logreg => ParamGrid::new()
                .add("C", vec![0.01.into(), 0.1.into(), 1.0.into(), 10.0.into()])
                .add("max_iter", vec![1000.into()]),
            ModelKind::RandomForest => ParamGrid::new()
                .add("n_estimators", vec![100.into(), 200.into()])
                .add("max_depth", vec![5.into(), 10.into(), ParamValue::Null])
                .add("min_samples_split", vec![2.into(), 5.into()]),
            ModelKind::GradientBoosting => ParamGrid::new()
                .add("n_estimators", vec![100.into(), 200.into()])
                .add("learning_rate", vec![0.01.into(), 0.1.into()])
                .add("max_depth", vec![3.into(), 5.into()]),
        }
    }

    fn known_params(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Logreg => &["C", "max_iter", "tol"],
            ModelKind::RandomForest => &["n_estimators", "max_depth", "min_samples_split", "min_samples_leaf"],
            ModelKind::GradientBoosting => &[
                "n_estimators",
                "learning_rate",
                "max_depth",
                "min_samples_split",
                "min_samples_leaf",
                "subsample",
            ],
        }
    }

    /// Construct an unfitted classifier from trial parameters.
    ///
    /// `seed` feeds the random state of the randomized algorithms.
    pub fn build(&self, params: &TrialParams, seed: u64) -> Result<Classifier> {
        params.check_known(self.known_params())?;

        let model = match self {
            ModelKind::Logreg => {
                let mut lr = LogisticRegression::new()
                    .with_c(params.get_f64("C", 1.0)?)
                    .with_max_iter(params.get_usize("max_iter", 1000)?);
                lr.tol = params.get_f64("tol", lr.tol)?;
                Classifier::Logreg(lr)
            }
            ModelKind::RandomForest => {
                let mut rf = RandomForest::new(params.get_usize("n_estimators", 100)?)
                    .with_max_depth(params.get_opt_usize("max_depth", None)?)
                    .with_min_samples_split(params.get_usize("min_samples_split", 2)?)
                    .with_random_state(seed);
                rf.min_samples_leaf = params.get_usize("min_samples_leaf", 1)?;
                Classifier::RandomForest(rf)
            }
            ModelKind::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                let config = GradientBoostingConfig {
                    n_estimators: params.get_usize("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.get_f64("learning_rate", defaults.learning_rate)?,
                    max_depth: params.get_usize("max_depth", defaults.max_depth)?,
                    min_samples_split: params.get_usize("min_samples_split", defaults.min_samples_split)?,
                    min_samples_leaf: params.get_usize("min_samples_leaf", defaults.min_samples_leaf)?,
                    subsample: params.get_f64("subsample", defaults.subsample)?,
                    random_state: Some(seed),
                };
                Classifier::GradientBoosting(GradientBoostingClassifier::new(config))
            }
        };
        Ok(model)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ChurnError::InvalidParameter {
                name: "model".to_string(),
                value: s.to_string(),
                reason: "expected one of: logreg, random_forest, gradient_boosting".to_string(),
            })
    }
}

/// A classifier of one of the candidate kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    Logreg(LogisticRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::Logreg(_) => ModelKind::Logreg,
            Classifier::RandomForest(_) => ModelKind::RandomForest,
            Classifier::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Classifier::Logreg(m) => m.fit(x, y).map(|_| ()),
            Classifier::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Classifier::GradientBoosting(m) => m.fit(x, y).map(|_| ()),
        }
    }

    /// Probability of churn for each row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::Logreg(m) => m.predict_proba(x),
            Classifier::RandomForest(m) => m.predict_proba(x),
            Classifier::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Classifier::Logreg(m) => m.is_fitted,
            Classifier::RandomForest(m) => m.is_fitted(),
            Classifier::GradientBoosting(m) => m.is_fitted(),
        }
    }
}
