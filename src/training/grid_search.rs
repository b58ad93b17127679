//! Exhaustive hyperparameter search with cross-validated ROC-AUC

use super::cross_validation::{CVSplit, CrossValidator};
use super::metrics::roc_auc_score;
use super::models::ModelKind;
use crate::data::{CustomerRecord, FeatureSchema};
use crate::error::{ChurnError, Result};
use crate::pipeline::ChurnPipeline;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// A single hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Unset / unlimited (e.g. `max_depth = None`)
    Null,
    Int(i64),
    Float(f64),
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("None"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One concrete hyperparameter assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialParams(BTreeMap<String, ParamValue>);

impl TrialParams {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, ParamValue)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn invalid(name: &str, value: &ParamValue, reason: &str) -> ChurnError {
        ChurnError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Fail on any parameter name not in `known`
    pub fn check_known(&self, known: &[&str]) -> Result<()> {
        match self.0.iter().find(|(k, _)| !known.contains(&k.as_str())) {
            Some((name, value)) => Err(Self::invalid(
                name,
                value,
                &format!("unknown parameter; expected one of: {}", known.join(", ")),
            )),
            None => Ok(()),
        }
    }

    pub fn get_f64(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(v @ ParamValue::Null) => Err(Self::invalid(name, v, "expected a number")),
        }
    }

    pub fn get_usize(&self, name: &str, default: usize) -> Result<usize> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(v) => Err(Self::invalid(name, v, "expected a non-negative integer")),
        }
    }

    /// Integer parameter where `Null` means unlimited
    pub fn get_opt_usize(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Null) => Ok(None),
            Some(_) => self.get_usize(name, 0).map(Some),
        }
    }
}

impl fmt::Display for TrialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Parameter name → candidate values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter's candidate values
    pub fn add(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    /// Number of combinations
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 1;
        }
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full cartesian product, parameter names in sorted order with the
    /// last name varying fastest. An empty grid yields one empty trial.
    pub fn iter_combinations(&self) -> Vec<TrialParams> {
        let mut combos = vec![BTreeMap::new()];
        for (name, values) in &self.0 {
            combos = combos
                .into_iter()
                .flat_map(|partial: BTreeMap<String, ParamValue>| {
                    values.iter().map(move |v| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), *v);
                        next
                    })
                })
                .collect();
        }
        combos.into_iter().map(TrialParams).collect()
    }
}

/// Cross-validated score of one combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub params: TrialParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Outcome of a grid search
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub kind: ModelKind,
    /// Every combination in grid order
    pub results: Vec<TrialResult>,
    pub best_params: TrialParams,
    pub best_score: f64,
    /// Best configuration refitted on the whole training partition
    pub best_pipeline: ChurnPipeline,
    pub search_time_secs: f64,
}

/// Exhaustive grid search over one model kind
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    kind: ModelKind,
    grid: ParamGrid,
    cv: CrossValidator,
    schema: FeatureSchema,
    seed: u64,
}

impl GridSearchCV {
    pub fn new(kind: ModelKind, grid: ParamGrid, cv: CrossValidator, schema: FeatureSchema, seed: u64) -> Self {
        Self { kind, grid, cv, schema, seed }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    fn evaluate_fold(
        &self,
        params: &TrialParams,
        split: &CVSplit,
        records: &[CustomerRecord],
        labels: &Array1<f64>,
    ) -> Result<f64> {
        let pick_records = |idx: &[usize]| idx.iter().map(|&i| records[i].clone()).collect::<Vec<_>>();
        let pick_labels = |idx: &[usize]| idx.iter().map(|&i| labels[i]).collect::<Array1<f64>>();

        let classifier = self.kind.build(params, self.seed)?;
        let mut pipeline = ChurnPipeline::new(self.schema.clone(), classifier);
        pipeline.fit(&pick_records(&split.train_indices), &pick_labels(&split.train_indices))?;

        let scores = pipeline.predict_proba(&pick_records(&split.test_indices))?;
        roc_auc_score(&pick_labels(&split.test_indices), &scores)
    }

    /// Search the grid on the training rows `train_idx` of `records`
    pub fn fit(
        &self,
        records: &[CustomerRecord],
        labels: &Array1<f64>,
        train_idx: &[usize],
    ) -> Result<GridSearchResult> {
        let start = Instant::now();
        if records.len() != labels.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} labels", records.len()),
                actual: format!("{} labels", labels.len()),
            });
        }

        let train_records: Vec<CustomerRecord> = train_idx.iter().map(|&i| records[i].clone()).collect();
        let train_labels: Array1<f64> = train_idx.iter().map(|&i| labels[i]).collect();

        let splits = self.cv.split(train_records.len(), Some(&train_labels))?;
        let combos = self.grid.iter_combinations();
        if combos.is_empty() {
            return Err(ChurnError::TrainingError(format!("empty parameter grid for {}", self.kind)));
        }

        info!(
            model = %self.kind,
            combinations = combos.len(),
            folds = splits.len(),
            "Starting grid search"
        );

        // Every (combination, fold) pair is independent; collect keeps the
        // pair order so the result does not depend on scheduling
        let jobs: Vec<(usize, usize)> = (0..combos.len())
            .flat_map(|c| (0..splits.len()).map(move |f| (c, f)))
            .collect();
        let scores: Vec<f64> = jobs
            .par_iter()
            .map(|&(c, f)| self.evaluate_fold(&combos[c], &splits[f], &train_records, &train_labels))
            .collect::<Result<Vec<_>>>()?;

        let results: Vec<TrialResult> = combos
            .into_iter()
            .zip(scores.chunks(splits.len()))
            .map(|(params, fold_scores)| {
                let n = fold_scores.len() as f64;
                let mean = fold_scores.iter().sum::<f64>() / n;
                let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
                debug!(model = %self.kind, params = %params, mean_auc = mean, "Trial scored");
                TrialResult {
                    params,
                    fold_scores: fold_scores.to_vec(),
                    mean_score: mean,
                    std_score: var.sqrt(),
                }
            })
            .collect();

        // First best in grid order wins ties; NaN never wins
        let best = results
            .iter()
            .filter(|r| !r.mean_score.is_nan())
            .fold(None::<&TrialResult>, |best, r| match best {
                Some(b) if b.mean_score >= r.mean_score => Some(b),
                _ => Some(r),
            })
            .ok_or_else(|| ChurnError::TrainingError(format!("no valid trial for {}", self.kind)))?;
        let best_params = best.params.clone();
        let best_score = best.mean_score;

        let classifier = self.kind.build(&best_params, self.seed)?;
        let mut best_pipeline = ChurnPipeline::new(self.schema.clone(), classifier);
        best_pipeline.fit(&train_records, &train_labels)?;

        let search_time_secs = start.elapsed().as_secs_f64();
        info!(
            model = %self.kind,
            best_params = %best_params,
            cv_roc_auc = best_score,
            elapsed_secs = search_time_secs,
            "Grid search complete"
        );

        Ok(GridSearchResult {
            kind: self.kind,
            results,
            best_params,
            best_score,
            best_pipeline,
            search_time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_order() {
        let grid = ParamGrid::new()
            .add("b", vec![1.into(), 2.into()])
            .add("a", vec![0.5.into(), ParamValue::Null]);
        let combos = grid.iter_combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(grid.len(), 4);
        assert_eq!(combos[0].to_string(), "a=0.5, b=1");
        assert_eq!(combos[1].to_string(), "a=0.5, b=2");
        assert_eq!(combos[3].to_string(), "a=None, b=2");
    }

    #[test]
    fn test_empty_grid_is_one_trial() {
        let combos = ParamGrid::new().iter_combinations();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn test_param_value_json() {
        let params = TrialParams::from_pairs([("C", 0.1.into()), ("max_depth", ParamValue::Null), ("n", 3.into())]);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"C":0.1,"max_depth":null,"n":3}"#);
        let back: TrialParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_typed_getters() {
        let params = TrialParams::from_pairs([("C", 2.into()), ("depth", ParamValue::Null), ("neg", (-1).into())]);
        assert_eq!(params.get_f64("C", 1.0).unwrap(), 2.0);
        assert_eq!(params.get_f64("missing", 1.5).unwrap(), 1.5);
        assert_eq!(params.get_opt_usize("depth", Some(3)).unwrap(), None);
        assert_eq!(params.get_opt_usize("missing", Some(3)).unwrap(), Some(3));
        assert!(params.get_usize("neg", 0).is_err());
        assert!(params.check_known(&["C", "depth"]).is_err());
    }
}
