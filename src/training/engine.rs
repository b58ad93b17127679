//! Training engine: load, split, search, evaluate, select, persist

use super::config::TrainingConfig;
use super::cross_validation::{stratified_train_test_split, CVStrategy, CrossValidator};
use super::grid_search::{GridSearchCV, TrialParams};
use super::metrics::{roc_auc_score, ClassificationReport};
use super::models::{ModelKind, ModelMetrics};
use super::selection::select_best;
use crate::artifact::{ArtifactMetadata, ChurnArtifact};
use crate::data::{DataLoader, Dataset, FeatureSchema};
use crate::error::{ChurnError, Result};
use crate::pipeline::ChurnPipeline;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome for one candidate algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub kind: ModelKind,
    pub best_params: TrialParams,
    /// Mean ROC-AUC of the best configuration over the CV folds
    pub cv_roc_auc: f64,
    pub cv_roc_auc_std: f64,
    /// ROC-AUC on the held-out test partition
    pub test_roc_auc: f64,
    pub classification_report: ClassificationReport,
    pub metrics: ModelMetrics,
    pub search_time_secs: f64,
}

impl CandidateReport {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Summary of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Candidates in evaluation order
    pub candidates: Vec<CandidateReport>,
    pub winner: String,
    pub winner_test_roc_auc: f64,
    /// Candidate name → test ROC-AUC
    pub test_scores: BTreeMap<String, f64>,
    pub n_train: usize,
    pub n_test: usize,
    pub dropped_rows: usize,
    /// Set once the artifact has been written
    pub artifact_path: Option<PathBuf>,
    pub training_time_secs: f64,
}

impl TrainingReport {
    pub fn candidate(&self, name: &str) -> Option<&CandidateReport> {
        self.candidates.iter().find(|c| c.name() == name)
    }
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
    schema: FeatureSchema,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            schema: FeatureSchema::telco(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Full run: load the dataset, train, and write the artifact
    pub fn run(&self) -> Result<TrainingReport> {
        self.config.validate()?;
        let dataset = DataLoader::new()
            .with_schema(self.schema.clone())
            .load_dataset(&self.config.data_path)?;

        let (artifact, mut report) = self.fit_dataset(&dataset)?;
        artifact.save(&self.config.artifact_path)?;
        report.artifact_path = Some(self.config.artifact_path.clone());
        Ok(report)
    }

    /// Train on an in-memory dataset without touching the filesystem
    pub fn fit_dataset(&self, dataset: &Dataset) -> Result<(ChurnArtifact, TrainingReport)> {
        let start = Instant::now();
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(ChurnError::TrainingError("dataset has no rows".to_string()));
        }

        let (negatives, positives) = dataset.class_counts();
        info!(rows = dataset.len(), churned = positives, retained = negatives, "Training data ready");
        if positives == 0 || negatives == 0 {
            return Err(ChurnError::TrainingError(
                "dataset contains a single class; churn and non-churn rows are both required".to_string(),
            ));
        }

        let seed = self.config.random_seed;
        let (train_idx, test_idx) = stratified_train_test_split(&dataset.labels, self.config.test_size, seed)?;
        info!(train = train_idx.len(), test = test_idx.len(), seed, "Stratified split");

        let (test_records, test_labels) = dataset.subset(&test_idx);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: false,
        })
        .with_random_state(seed);

        let mut reports = Vec::with_capacity(self.config.candidates.len());
        let mut pipelines: BTreeMap<String, ChurnPipeline> = BTreeMap::new();

        for candidate in &self.config.candidates {
            let search = GridSearchCV::new(candidate.kind, candidate.grid.clone(), cv.clone(), self.schema.clone(), seed);
            let result = search.fit(&dataset.records, &dataset.labels, &train_idx)?;

            let cv_roc_auc_std = result
                .results
                .iter()
                .find(|r| r.params == result.best_params)
                .map_or(0.0, |r| r.std_score);

            let proba = result.best_pipeline.predict_proba(&test_records)?;
            let threshold = self.config.threshold;
            let predicted = proba.mapv(|p| if p >= threshold { 1.0 } else { 0.0 });

            let report = CandidateReport {
                kind: result.kind,
                best_params: result.best_params,
                cv_roc_auc: result.best_score,
                cv_roc_auc_std,
                test_roc_auc: roc_auc_score(&test_labels, &proba)?,
                classification_report: ClassificationReport::compute(&test_labels, &predicted)?,
                metrics: ModelMetrics::compute(&test_labels, &proba, threshold)?,
                search_time_secs: result.search_time_secs,
            };

            info!(
                model = report.name(),
                cv_roc_auc = report.cv_roc_auc,
                test_roc_auc = report.test_roc_auc,
                "Candidate evaluated"
            );
            pipelines.insert(report.name().to_string(), result.best_pipeline);
            reports.push(report);
        }

        let test_scores: BTreeMap<String, f64> = reports
            .iter()
            .map(|r| (r.name().to_string(), r.test_roc_auc))
            .collect();
        let (winner, winner_auc) = select_best(&test_scores)
            .ok_or_else(|| ChurnError::TrainingError("no candidate produced a valid test score".to_string()))?;
        info!(winner = %winner, test_roc_auc = winner_auc, "Selected best model");

        let pipeline = pipelines
            .remove(&winner)
            .ok_or_else(|| ChurnError::TrainingError(format!("missing pipeline for {}", winner)))?;
        let winner_report = reports
            .iter()
            .find(|r| r.name() == winner)
            .ok_or_else(|| ChurnError::TrainingError(format!("missing report for {}", winner)))?;

        if winner_auc < 0.5 {
            warn!(test_roc_auc = winner_auc, "Best model ranks worse than chance on the test partition");
        }

        let metadata = ArtifactMetadata {
            model_name: winner.clone(),
            params: winner_report.best_params.clone(),
            cv_roc_auc: winner_report.cv_roc_auc,
            test_roc_auc: winner_auc,
            candidate_scores: test_scores.clone(),
            trained_at: Utc::now(),
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            dropped_rows: dataset.dropped_rows,
            seed,
            threshold: self.config.threshold,
            feature_names: pipeline.feature_names(),
            crate_version: crate::VERSION.to_string(),
        };
        let artifact = ChurnArtifact::new(self.schema.clone(), pipeline, metadata);

        let report = TrainingReport {
            candidates: reports,
            winner,
            winner_test_roc_auc: winner_auc,
            test_scores,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            dropped_rows: dataset.dropped_rows,
            artifact_path: None,
            training_time_secs: start.elapsed().as_secs_f64(),
        };
        Ok((artifact, report))
    }
}
