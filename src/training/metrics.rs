//! Evaluation metrics for binary classifiers

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

fn check_lengths(a: &Array1<f64>, b: &Array1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(ChurnError::ShapeError {
            expected: format!("{} values", a.len()),
            actual: format!("{} values", b.len()),
        });
    }
    if a.is_empty() {
        return Err(ChurnError::ValidationError("metric computed on zero samples".to_string()));
    }
    Ok(())
}

/// Area under the ROC curve.
///
/// Computed as the normalized Mann-Whitney U statistic; tied scores get
/// their average rank. Fails when `y_true` holds a single class.
pub fn roc_auc_score(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_score)?;

    let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ChurnError::ValidationError(
            "ROC AUC is undefined when only one class is present in y_true".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    // 1-based average ranks over runs of equal scores
    let mut pos_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| y_true[i] > 0.5).count();
        pos_rank_sum += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1
pub fn log_loss(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_prob)?;
    let eps = 1e-15;
    let total: f64 = y_true
        .iter()
        .zip(y_prob)
        .map(|(&t, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self { precision, recall, f1_score, support: tp + fn_ }
    }
}

/// Per-class and averaged metrics for a binary prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Metrics for class 0 and class 1
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build the report from 0/1 labels and 0/1 predictions
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        // counts[true][pred]
        let mut counts = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts[(t > 0.5) as usize][(p > 0.5) as usize] += 1;
        }

        let class = |c: usize| {
            let other = 1 - c;
            ClassMetrics::from_counts(counts[c][c], counts[other][c], counts[c][other])
        };
        let classes = [class(0), class(1)];

        let n = y_true.len();
        let accuracy = (counts[0][0] + counts[1][1]) as f64 / n as f64;

        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let total: f64 = classes.iter().map(|c| weight(c)).sum();
            let mean = |f: fn(&ClassMetrics) -> f64| {
                if total > 0.0 {
                    classes.iter().map(|c| weight(c) * f(c)).sum::<f64>() / total
                } else {
                    0.0
                }
            };
            ClassMetrics {
                precision: mean(|c| c.precision),
                recall: mean(|c| c.recall),
                f1_score: mean(|c| c.f1_score),
                support: n,
            }
        };
        let macro_avg = average(&|_| 1.0);
        let weighted_avg = average(&|c| c.support as f64);

        Ok(Self { classes, accuracy, macro_avg, weighted_avg })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1_score, m.support
            )
        };

        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        row(f, "0", &self.classes[0])?;
        row(f, "1", &self.classes[1])?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}
