//! Decision tree implementation

use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity over 0/1 targets (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    /// Impurity of a node from its target count, sum and sum of squares
    fn impurity(self, count: usize, sum: f64, sq_sum: f64) -> f64 {
        if count == 0 {
            return 0.0;
        }
        let n = count as f64;
        match self {
            Criterion::Gini => {
                let p = sum / n;
                2.0 * p * (1.0 - p)
            }
            Criterion::MSE => (sq_sum / n - (sum / n).powi(2)).max(0.0),
        }
    }
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
///
/// Classification trees are fitted on 0/1 targets and their leaves hold the
/// fraction of positive samples, so `predict` yields a class-1 probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at random for each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Consider a random subset of `n` features at each split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree; leaves predict the mean target of their samples
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.fit_with_leaf_values(x, y, |indices| {
            indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
        })
    }

    /// Fit the tree structure on `y`, then set every leaf to
    /// `leaf_value(indices of the samples in that leaf)`.
    pub fn fit_with_leaf_values<F>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        leaf_value: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&[usize]) -> f64,
    {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ChurnError::TrainingError("cannot fit a tree on zero samples".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ChurnError::InvalidParameter {
                name: "min_samples_leaf".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, &leaf_value, &mut rng, &mut importances);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree<F>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        leaf_value: &F,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode
    where
        F: Fn(&[usize]) -> f64,
    {
        let n_samples = indices.len();
        let leaf = || TreeNode::Leaf {
            value: leaf_value(indices),
            n_samples,
        };

        let (sum, sq_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
        let parent_impurity = self.criterion.impurity(n_samples, sum, sq_sum);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= f64::EPSILON;
        if should_stop {
            return leaf();
        }

        let Some(split) = self.find_best_split(x, y, indices, parent_impurity, rng) else {
            return leaf();
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf();
        }

        importances[split.feature_idx] += n_samples as f64 * split.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, leaf_value, rng, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, leaf_value, rng, importances));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Random feature order; the first `max_features` are scanned first
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> (Vec<usize>, usize) {
        let n = self.n_features;
        match self.max_features {
            Some(k) if k < n => {
                let order = rand::seq::index::sample(rng, n, n).into_vec();
                (order, k.max(1))
            }
            _ => ((0..n).collect(), n),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let (order, k) = self.candidate_features(rng);
        let mut first: Vec<usize> = order[..k].to_vec();
        first.sort_unstable();

        let per_feature: Vec<Option<SplitCandidate>> = first
            .par_iter()
            .map(|&f| self.best_split_on(x, y, indices, f, parent_impurity))
            .collect();

        // Ties keep the lowest feature index
        let best = per_feature.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, cand| match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        });

        // No valid split among the sampled features (all constant in this
        // node): keep drawing until one splits
        best.or_else(|| {
            order[k..]
                .iter()
                .find_map(|&f| self.best_split_on(x, y, indices, f, parent_impurity))
        })
    }

    /// Scan one feature over its sorted values, keeping running left-side
    /// statistics
    fn best_split_on(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (total_sum, total_sq) = pairs.iter().fold((0.0, 0.0), |(s, sq), &(_, t)| (s + t, sq + t * t));

        let mut best: Option<SplitCandidate> = None;
        let (mut left_sum, mut left_sq) = (0.0, 0.0);

        for k in 0..n - 1 {
            let (value, target) = pairs[k];
            left_sum += target;
            left_sq += target * target;

            let next = pairs[k + 1].0;
            if value == next {
                continue;
            }
            let left_count = k + 1;
            let right_count = n - left_count;
            if left_count < min_leaf || right_count < min_leaf {
                continue;
            }

            let left_imp = self.criterion.impurity(left_count, left_sum, left_sq);
            let right_imp = self.criterion.impurity(right_count, total_sum - left_sum, total_sq - left_sq);
            let weighted = (left_count as f64 * left_imp + right_count as f64 * right_imp) / n as f64;
            let gain = parent_impurity - weighted;

            if gain > best.map_or(0.0, |b| b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }
        best
    }

    /// Predict leaf values for each row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ChurnError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.axis_iter(Axis(0)).map(|row| root.predict_row(row)).collect())
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}
