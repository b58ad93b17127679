//! Linear model implementations

use crate::error::{ChurnError, Result};
use ndarray::{concatenate, s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Solve a symmetric positive-definite system `A x = b` by Cholesky
/// decomposition.
///
/// A near-singular matrix is retried with a small ridge on the diagonal;
/// `None` if it is still not positive definite.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mean_diag = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    for ridge in [0.0, 1e-10 * mean_diag, 1e-6 * mean_diag] {
        if let Some(l) = cholesky_factor(a, ridge) {
            return Some(cholesky_substitute(&l, b));
        }
    }
    None
}

/// Lower-triangular `L` with `A + ridge * I = L L^T`
fn cholesky_factor(a: &Array2<f64>, ridge: f64) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] + ridge - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// L2-regularized logistic regression
///
/// Minimizes `0.5 * ||w||^2 + C * sum(log_loss)` with an unpenalized
/// intercept, using Newton steps with backtracking line search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Convergence tolerance on the largest gradient component
    pub tol: f64,
    /// Iterations used by the last fit
    pub n_iter: usize,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            n_iter: 0,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Regularized objective at `theta = [w, b]`
    fn objective(&self, xa: &Array2<f64>, y: &Array1<f64>, theta: &Array1<f64>) -> f64 {
        let d = theta.len() - 1;
        let z = xa.dot(theta);
        let loss: f64 = z.iter().zip(y).map(|(&zi, &yi)| softplus(zi) - yi * zi).sum();
        let w = theta.slice(s![..d]);
        0.5 * w.dot(&w) + self.c * loss
    }

    /// Fit the model with Newton's method
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ChurnError::TrainingError("cannot fit on zero samples".to_string()));
        }
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ChurnError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }

        // Design matrix with a trailing intercept column
        let xa = concatenate(Axis(1), &[x.view(), Array2::ones((n_samples, 1)).view()])?;
        let d = n_features + 1;
        let mut theta = Array1::<f64>::zeros(d);
        let mut f = self.objective(&xa, y, &theta);
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let p = xa.dot(&theta).mapv(sigmoid);
            let residual = &p - y;

            let mut grad = xa.t().dot(&residual) * self.c;
            for j in 0..n_features {
                grad[j] += theta[j];
            }

            if grad.iter().fold(0.0f64, |m, g| m.max(g.abs())) <= self.tol {
                break;
            }

            // Hessian: C * Xa^T S Xa + diag(1, ..., 1, 0)
            let sqrt_w = p.mapv(|pi| (pi * (1.0 - pi)).sqrt());
            let xw = &xa * &sqrt_w.insert_axis(Axis(1));
            let mut hessian = xw.t().dot(&xw) * self.c;
            for j in 0..n_features {
                hessian[[j, j]] += 1.0;
            }

            let step = cholesky_solve(&hessian, &grad).ok_or_else(|| {
                ChurnError::ComputationError("Newton system is not positive definite".to_string())
            })?;

            // Backtracking line search on the objective
            let slope = grad.dot(&step);
            let mut t = 1.0;
            let mut accepted = false;
            for _ in 0..30 {
                let candidate = &theta - &(&step * t);
                let f_new = self.objective(&xa, y, &candidate);
                if f_new <= f - 1e-4 * t * slope {
                    theta = candidate;
                    f = f_new;
                    accepted = true;
                    break;
                }
                t *= 0.5;
            }
            if !accepted {
                break;
            }
        }

        debug!(c = self.c, iterations = n_iter, objective = f, "Logistic regression fitted");

        self.coefficients = Some(theta.slice(s![..n_features]).to_owned());
        self.intercept = Some(theta[n_features]);
        self.n_iter = n_iter;
        self.is_fitted = true;

        Ok(self)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(coef), Some(intercept)) = (&self.coefficients, self.intercept) else {
            return Err(ChurnError::ModelNotFitted);
        };
        if x.ncols() != coef.len() {
            return Err(ChurnError::ShapeError {
                expected: format!("{} features", coef.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x.dot(coef) + intercept).mapv(sigmoid))
    }

    /// Class predictions at 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Accuracy on the given data
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let pred = self.predict(x)?;
        let correct = pred.iter().zip(y).filter(|(p, t)| (*p - *t).abs() < 0.5).count();
        Ok(correct as f64 / y.len().max(1) as f64)
    }
}
