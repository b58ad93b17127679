//! Model training
//!
//! Candidate algorithms implemented over `ndarray`:
//! - L2-regularised logistic regression (Newton solver)
//! - Random forest of CART trees
//! - Gradient boosting with log-loss
//!
//! plus the stratified splitting, grid search, metrics and selection that
//! turn them into a single trained artifact.

mod config;
mod engine;
mod models;
mod selection;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod grid_search;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use config::{CandidateSpec, TrainingConfig};
pub use engine::{CandidateReport, TrainEngine, TrainingReport};
pub use models::{Classifier, ModelKind, ModelMetrics};
pub use selection::select_best;
pub use cross_validation::{stratified_train_test_split, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{GridSearchCV, GridSearchResult, ParamGrid, ParamValue, TrialParams, TrialResult};
pub use linear_models::LogisticRegression;
pub use metrics::{log_loss, roc_auc_score, ClassMetrics, ClassificationReport};
pub use random_forest::{MaxFeatures, RandomForest};
