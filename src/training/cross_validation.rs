//! Train/test splitting and cross-validation folds

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Group sample indices by rounded class label, in class order
fn indices_by_class(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        classes.entry(val.round() as i64).or_default().push(idx);
    }
    classes
}

/// Split sample indices into train and test partitions, stratified on `y`.
///
/// Each class is shuffled with a seeded RNG and contributes
/// `round(test_size * class_size)` samples to the test partition (at least
/// one to each side when the class has two or more samples). Both returned
/// index lists are sorted.
pub fn stratified_train_test_split(
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be strictly between 0 and 1".to_string(),
        });
    }

    let classes = indices_by_class(y);
    if classes.len() < 2 {
        return Err(ChurnError::ValidationError(format!(
            "stratified split needs at least 2 classes, found {}",
            classes.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for (class, mut indices) in classes {
        if indices.len() < 2 {
            return Err(ChurnError::ValidationError(format!(
                "class {} has {} sample(s); stratified split needs at least 2",
                class,
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_size).round() as usize;
        let n_test = n_test.clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(CVStrategy::default())
    }
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state used when shuffling
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0))
    }

    /// Generate train/test splits over `0..n_samples`
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(n_samples, *n_splits, *shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    ChurnError::ValidationError("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(ChurnError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check_n_splits(n_splits: usize, n_samples: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(ChurnError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(ChurnError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_n_splits(n_splits, n_samples)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_n_splits(n_splits, y.len())?;

        let mut rng = self.rng();
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];

        // Deal each class round-robin over the folds; the counter carries
        // over between classes so fold sizes stay within one of each other
        let mut next = 0;
        for (class, mut indices) in indices_by_class(y) {
            if indices.len() < n_splits {
                return Err(ChurnError::ValidationError(format!(
                    "class {} has {} sample(s), fewer than n_splits ({})",
                    class,
                    indices.len(),
                    n_splits
                )));
            }
            if shuffle {
                indices.shuffle(&mut rng);
            }
            for idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }
        Ok(Self::splits_from_folds(folds))
    }

    fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect()
    }
}
