//! Standard (z-score) feature scaling

use crate::error::{ChurnError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean
    scale: f64,  // population std, 1.0 for constant columns
}

/// Standard scaling: (x - mean) / std, with parameters learned at fit time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn mean and standard deviation per column of `x`.
    ///
    /// `columns` names the columns of `x` in order.
    pub fn fit(&mut self, columns: &[&str], x: &Array2<f64>) -> Result<&mut Self> {
        if columns.len() != x.ncols() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() == 0 {
            return Err(ChurnError::PreprocessingError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mean = col.mean().unwrap_or(0.0);
                let std = col.std(0.0);
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Apply the fitted scaling
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ChurnError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.to_owned();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, columns: &[&str], x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(columns, x)?;
        self.transform(x)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.center).collect()
    }

    pub fn scales(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
