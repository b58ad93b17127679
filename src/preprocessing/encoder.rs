//! One-hot encoding of categorical columns

use crate::error::{ChurnError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder that ignores unknown categories.
///
/// Categories are learned per column at fit time and kept sorted. A value
/// not seen during fit encodes to an all-zero block instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: Vec<Vec<String>>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn categories from row-major values (`rows[i][j]` is column `j`)
    pub fn fit(&mut self, columns: &[&str], rows: &[Vec<&str>]) -> Result<&mut Self> {
        if rows.is_empty() {
            return Err(ChurnError::PreprocessingError(
                "cannot fit encoder on zero rows".to_string(),
            ));
        }

        let mut seen: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); columns.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ChurnError::ShapeError {
                    expected: format!("{} categorical values", columns.len()),
                    actual: format!("{} at row {}", row.len(), i),
                });
            }
            for (set, value) in seen.iter_mut().zip(row) {
                set.insert(*value);
            }
        }

        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.categories = seen
            .into_iter()
            .map(|set| set.into_iter().map(String::from).collect())
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode rows into a dense indicator matrix
    pub fn transform(&self, rows: &[Vec<&str>]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }

        let offsets = self.offsets();
        let mut out = Array2::zeros((rows.len(), self.n_outputs()));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(ChurnError::ShapeError {
                    expected: format!("{} categorical values", self.columns.len()),
                    actual: format!("{} at row {}", row.len(), i),
                });
            }
            for (j, value) in row.iter().enumerate() {
                if let Ok(k) = self.categories[j].binary_search_by(|c| c.as_str().cmp(value)) {
                    out[[i, offsets[j] + k]] = 1.0;
                }
            }
        }
        Ok(out)
    }

    /// Total number of indicator columns
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// Output names as `column=category`
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{}={}", col, c)))
            .collect()
    }

    /// Learned categories of a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|j| self.categories[j].as_slice())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn offsets(&self) -> Vec<usize> {
        self.categories
            .iter()
            .scan(0, |acc, cats| {
                let start = *acc;
                *acc += cats.len();
                Some(start)
            })
            .collect()
    }
}
