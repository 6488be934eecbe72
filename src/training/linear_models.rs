//! Linear model implementations

use super::models::{argmax, check_width, check_xy, class_count, Model};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `A x = b` with a Cholesky
/// factorization. Returns `None` when `A` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

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

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Solve the normal equations, adding an escalating ridge to the diagonal
/// until the system factors. One-hot blocks make `X^T X` singular.
fn solve_normal_equations(xtx: &Array2<f64>, xty: &Array1<f64>) -> Option<Array1<f64>> {
    let n = xtx.nrows();
    if n == 0 {
        return Some(Array1::zeros(0));
    }
    let scale = (xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1e-12);

    std::iter::once(0.0)
        .chain((0..8).map(|k| scale * 10f64.powi(k * 2 - 12)))
        .find_map(|ridge| {
            let mut a = xtx.clone();
            for i in 0..n {
                a[[i, i]] += ridge;
            }
            cholesky_solve(&a, xty)
        })
}

/// Ordinary least squares with intercept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let y_mean = y.mean().unwrap_or(0.0);
        let x_centered = x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = y - y_mean;

        let xtx = x_centered.t().dot(&x_centered);
        let xty = x_centered.t().dot(&y_centered);
        let coefficients = solve_normal_equations(&xtx, &xty).ok_or_else(|| {
            SelectError::Training("normal equations could not be solved".to_string())
        })?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("LinearRegression".to_string()))?;
        check_width(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

/// Multinomial logistic regression with L2 penalty, fitted by batch
/// gradient descent on the softmax cross-entropy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
    /// `(n_features, n_classes)`
    weights: Option<Array2<f64>>,
    bias: Array1<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            learning_rate: 0.5,
            tol: 1e-6,
            weights: None,
            bias: Array1::zeros(0),
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
        for mut row in logits.rows_mut() {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        logits
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("LogisticRegression".to_string()))?;
        check_width(weights.nrows(), x)?;
        Ok(Self::softmax_rows(x.dot(weights) + &self.bias))
    }
}

impl Model for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if !(self.c > 0.0) {
            return Err(SelectError::invalid_param("C", self.c, "must be positive"));
        }
        if self.max_iter == 0 {
            return Err(SelectError::invalid_param("max_iter", 0, "must be at least 1"));
        }

        let n_samples = x.nrows() as f64;
        let n_classes = class_count(y)?.max(2);
        let mut targets = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (i, &label) in y.iter().enumerate() {
            targets[[i, label as usize]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((x.ncols(), n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let penalty = 1.0 / (self.c * n_samples);

        for _ in 0..self.max_iter {
            let proba = Self::softmax_rows(x.dot(&weights) + &bias);
            let errors = proba - &targets;

            let dw = x.t().dot(&errors) / n_samples + &weights * penalty;
            let db = errors.sum_axis(Axis(0)) / n_samples;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            weights = weights - dw * self.learning_rate;
            bias = bias - db * self.learning_rate;
            if grad_norm < self.tol {
                break;
            }
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(SelectError::Training("logistic regression diverged".to_string()));
        }
        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row) as f64).collect())
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}
