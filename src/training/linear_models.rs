//! Linear model implementations

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a tiny ridge if the matrix is not positive definite.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    match cholesky_factor(a) {
        Some(l) => Some(cholesky_substitute(&l, b)),
        None => {
            let mut a_reg = a.clone();
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            let ridge = if ridge > 0.0 { ridge } else { 1e-12 };
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_factor(&a_reg).map(|l| cholesky_substitute(&l, b))
        }
    }
}

/// Lower-triangular L with A = L * L^T, or None when A is not positive definite
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
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

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
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

/// Matrix inversion by Gauss-Jordan elimination with partial pivoting (fallback)
pub(crate) fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }

    Some(inv)
}

/// Cholesky first, Gauss-Jordan inverse second
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>, what: &str) -> Result<Array1<f64>> {
    cholesky_solve(a, b)
        .or_else(|| matrix_inverse(a).map(|inv| inv.dot(b)))
        .ok_or_else(|| PipelineError::ComputationError(format!("{} is singular", what)))
}

fn check_rows(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::DataError("cannot fit on zero samples".to_string()));
    }
    Ok(())
}

fn check_features(x: &Array2<f64>, coefficients: &Array1<f64>) -> Result<()> {
    if x.ncols() != coefficients.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", coefficients.len()),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Ordinary least squares regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            is_fitted: false,
        }
    }

    /// Fit by solving the normal equations on centered data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_rows(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::DataError("empty feature matrix".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let x_centered = x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let xtx = x_centered.t().dot(&x_centered);
        let xty = x_centered.t().dot(&y_centered);
        let coefficients = solve_spd(&xtx, &xty, "X^T X")?;
        let intercept = y_mean - coefficients.dot(&x_mean);

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.is_fitted = true;

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_features(x, coefficients)?;

        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }
}

/// L2-regularized logistic regression for binary 0/1 labels.
///
/// Minimizes `sum(log-loss) + ||w||² / (2C)` with damped Newton steps; the
/// intercept is not penalized.
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
    /// Max-abs gradient tolerance
    pub tol: f64,
    /// Iterations used by the last fit
    pub n_iter: usize,
    /// Whether the last fit met the tolerance
    pub converged: bool,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z) without overflow
fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            n_iter: 0,
            converged: false,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Features with a trailing column of ones for the intercept
    fn design_matrix(x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let d = x.ncols();
        Array2::from_shape_fn((n, d + 1), |(i, j)| if j < d { x[[i, j]] } else { 1.0 })
    }

    fn objective(xa: &Array2<f64>, y: &Array1<f64>, theta: &Array1<f64>, penalty: &Array1<f64>) -> f64 {
        let z = xa.dot(theta);
        let loss: f64 = z
            .iter()
            .zip(y.iter())
            .map(|(&zi, &yi)| log1p_exp(zi) - yi * zi)
            .sum();
        loss + 0.5 * (penalty * &theta.mapv(|t| t * t)).sum()
    }

    /// Fit with damped Newton iterations
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_rows(x, y)?;
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(PipelineError::ConfigError(format!(
                "C must be positive and finite, got {}",
                self.c
            )));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::DataError(
                "logistic regression expects 0/1 labels".to_string(),
            ));
        }
        let positives = y.iter().filter(|&&v| v == 1.0).count();
        if positives == 0 || positives == y.len() {
            return Err(PipelineError::ComputationError(
                "training labels contain a single class; at least 2 are required".to_string(),
            ));
        }

        let n_features = x.ncols();
        let xa = Self::design_matrix(x);
        let dim = xa.ncols();
        let lambda = 1.0 / self.c;
        let penalty = Array1::from_shape_fn(dim, |j| if j < n_features { lambda } else { 0.0 });

        let mut theta: Array1<f64> = Array1::zeros(dim);
        let mut objective = Self::objective(&xa, y, &theta, &penalty);
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;

            let p = xa.dot(&theta).mapv(sigmoid);
            let grad = xa.t().dot(&(&p - y)) + &penalty * &theta;
            let grad_max = grad.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if grad_max <= self.tol {
                converged = true;
                break;
            }

            let weights = p.mapv(|pi| (pi * (1.0 - pi)).max(1e-12));
            let weighted = &xa * &weights.view().insert_axis(Axis(1));
            let mut hessian = xa.t().dot(&weighted);
            for j in 0..dim {
                hessian[[j, j]] += penalty[j] + 1e-10;
            }
            let step = solve_spd(&hessian, &grad, "Hessian")?;

            // Backtracking line search on the penalized objective
            let slope = grad.dot(&step);
            let mut t = 1.0;
            let (candidate, candidate_obj) = loop {
                let candidate = &theta - &(&step * t);
                let candidate_obj = Self::objective(&xa, y, &candidate, &penalty);
                if candidate_obj <= objective - 1e-4 * t * slope || t < 1e-10 {
                    break (candidate, candidate_obj);
                }
                t *= 0.5;
            };

            if !candidate_obj.is_finite() {
                return Err(PipelineError::ComputationError(format!(
                    "logistic regression diverged at iteration {} (C = {})",
                    n_iter, self.c
                )));
            }

            let moved = step.iter().fold(0.0_f64, |m, s| m.max((s * t).abs()));
            theta = candidate;
            objective = candidate_obj;
            if moved < 1e-12 {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "logistic regression did not converge in {} iterations (C = {})",
                n_iter, self.c
            );
        }

        let coefficients = theta.slice(ndarray::s![..n_features]).to_owned();
        let intercept = theta[n_features];

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.n_iter = n_iter;
        self.converged = converged;
        self.is_fitted = true;

        Ok(self)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_features(x, coefficients)?;

        let linear = x.dot(coefficients) + self.intercept.unwrap_or(0.0);
        Ok(linear.mapv(sigmoid))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}
