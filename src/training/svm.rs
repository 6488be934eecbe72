//! Support Vector Machine implementations
//!
//! RBF-kernel classifier trained with simplified SMO (one-vs-rest for more
//! than two classes) and an epsilon-insensitive regressor trained by dual
//! coordinate descent.

use super::models::{check_width, check_xy, class_count, Model};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// RBF width: K(x, y) = exp(-gamma * ||x - y||^2)
    pub gamma: f64,
    pub tol: f64,
    /// Maximum passes over the data
    pub max_iter: usize,
    pub random_state: u64,
    /// Tube width for regression
    pub epsilon: f64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: 0.1,
            tol: 1e-3,
            max_iter: 200,
            random_state: 42,
            epsilon: 0.1,
        }
    }
}

impl SVMConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    fn validate(&self, n_samples: usize) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(SelectError::invalid_param("C", self.c, "must be positive"));
        }
        if !(self.gamma > 0.0) {
            return Err(SelectError::invalid_param("gamma", self.gamma, "must be positive"));
        }
        if n_samples > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(SelectError::Training(format!(
                "{} samples exceed the kernel matrix limit of {}",
                n_samples, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        Ok(())
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * sq).exp()
}

/// Full kernel matrix, rows computed in parallel
fn kernel_matrix(x: &Array2<f64>, gamma: f64) -> Array2<f64> {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (0..n).map(|j| rbf(x.row(i), x.row(j), gamma)).collect())
        .collect();
    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

/// Kernel expansion `sum_i coef_i K(sv_i, x) + bias`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KernelExpansion {
    support_vectors: Array2<f64>,
    coefficients: Array1<f64>,
    bias: f64,
}

impl KernelExpansion {
    fn from_dual(x: &Array2<f64>, coefficients: &Array1<f64>, bias: f64) -> Self {
        let support: Vec<usize> = (0..coefficients.len())
            .filter(|&i| coefficients[i].abs() > 1e-8)
            .collect();
        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        for (row, &i) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(i));
        }
        Self {
            support_vectors,
            coefficients: support.iter().map(|&i| coefficients[i]).collect(),
            bias,
        }
    }

    fn decision(&self, row: ArrayView1<f64>, gamma: f64) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(sv, &c)| c * rbf(sv, row, gamma))
            .sum::<f64>()
            + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    /// Classes present at fit time
    classes: Vec<usize>,
    /// One machine for two classes, one per class otherwise
    machines: Vec<KernelExpansion>,
    n_features: usize,
    is_fitted: bool,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            machines: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Simplified SMO on labels in {-1, +1}
    fn smo_train(&self, kernel: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let decision = |alphas: &Array1<f64>, bias: f64, i: usize| -> f64 {
            (0..n).map(|k| alphas[k] * y[k] * kernel[[k, i]]).sum::<f64>() + bias
        };

        let mut passes = 0;
        let mut iterations = 0;
        while passes < 5 && iterations < self.config.max_iter {
            let mut changed = 0;
            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                let violates = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];
                let (ai_old, aj_old) = (alphas[i], alphas[j]);

                let (low, high) = if y[i] != y[j] {
                    ((aj_old - ai_old).max(0.0), (c + aj_old - ai_old).min(c))
                } else {
                    ((ai_old + aj_old - c).max(0.0), (ai_old + aj_old).min(c))
                };
                if (high - low).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (aj_old - y[j] * (e_i - e_j) / eta).clamp(low, high);
                if (alphas[j] - aj_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = ai_old + y[i] * y[j] * (aj_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - ai_old) * kernel[[i, i]]
                    - y[j] * (alphas[j] - aj_old) * kernel[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - ai_old) * kernel[[i, j]]
                    - y[j] * (alphas[j] - aj_old) * kernel[[j, j]];
                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                changed += 1;
            }

            iterations += 1;
            passes = if changed == 0 { passes + 1 } else { 0 };
        }

        let signed = &alphas * y;
        (signed, bias)
    }

    fn train_machine(&self, x: &Array2<f64>, kernel: &Array2<f64>, y: &Array1<f64>, positive: usize) -> KernelExpansion {
        let y_binary = y.mapv(|v| if v as usize == positive { 1.0 } else { -1.0 });
        let (coefficients, bias) = self.smo_train(kernel, &y_binary);
        KernelExpansion::from_dual(x, &coefficients, bias)
    }
}

impl Model for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.config.validate(x.nrows())?;

        let mut present = vec![false; class_count(y)?];
        for &v in y.iter() {
            present[v as usize] = true;
        }
        self.classes = (0..present.len()).filter(|&c| present[c]).collect();
        self.n_features = x.ncols();

        self.machines = if self.classes.len() < 2 {
            Vec::new()
        } else {
            let kernel = kernel_matrix(x, self.config.gamma);
            if self.classes.len() == 2 {
                vec![self.train_machine(x, &kernel, y, self.classes[1])]
            } else {
                self.classes
                    .iter()
                    .map(|&cls| self.train_machine(x, &kernel, y, cls))
                    .collect()
            }
        };
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(SelectError::NotFitted("SVMClassifier".to_string()));
        }
        check_width(self.n_features, x)?;
        let gamma = self.config.gamma;

        let predictions = x
            .rows()
            .into_iter()
            .map(|row| match self.machines.len() {
                0 => self.classes.first().copied().unwrap_or(0) as f64,
                1 => {
                    let idx = if self.machines[0].decision(row, gamma) >= 0.0 { 1 } else { 0 };
                    self.classes[idx] as f64
                }
                _ => {
                    let best = self
                        .machines
                        .iter()
                        .map(|m| m.decision(row, gamma))
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, v)| if v > bv { (i, v) } else { (bi, bv) })
                        .0;
                    self.classes[best] as f64
                }
            })
            .collect();
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Epsilon-insensitive support vector regressor.
///
/// The bias is folded into the kernel (`K + 1`), which removes the equality
/// constraint and lets each dual variable be optimized in closed form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    expansion: Option<KernelExpansion>,
    n_features: usize,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            expansion: None,
            n_features: 0,
        }
    }
}

impl Model for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.config.validate(x.nrows())?;

        let n = x.nrows();
        let c = self.config.c;
        let eps = self.config.epsilon;
        let mut kernel = kernel_matrix(x, self.config.gamma);
        kernel.mapv_inplace(|v| v + 1.0);

        let mut beta = Array1::<f64>::zeros(n);
        // f = K' beta, kept current across updates
        let mut f = Array1::<f64>::zeros(n);

        for _ in 0..self.config.max_iter {
            let mut max_delta = 0.0f64;
            for i in 0..n {
                let a = kernel[[i, i]];
                let linear = f[i] - a * beta[i] - y[i];
                let shrunk = (linear.abs() - eps).max(0.0);
                let updated = (-linear.signum() * shrunk / a).clamp(-c, c);
                let delta = updated - beta[i];
                if delta != 0.0 {
                    beta[i] = updated;
                    f.scaled_add(delta, &kernel.column(i));
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < self.config.tol {
                break;
            }
        }

        // Bias is the sum of coefficients under the augmented kernel
        let bias = beta.sum();
        self.expansion = Some(KernelExpansion::from_dual(x, &beta, bias));
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let expansion = self
            .expansion
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("SVMRegressor".to_string()))?;
        check_width(self.n_features, x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| expansion.decision(row, self.config.gamma))
            .collect())
    }

    fn is_fitted(&self) -> bool {
        self.expansion.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_classifier() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [0.1, 0.3], [3.0, 3.0], [3.2, 2.9], [2.9, 3.1]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut svm = SVMClassifier::new(SVMConfig::default().with_c(10.0).with_gamma(0.5));
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [5.0, 0.0], [5.1, 0.1], [0.0, 5.0], [0.1, 5.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut svm = SVMClassifier::new(SVMConfig::default().with_c(10.0).with_gamma(0.5));
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_single_class_fold_predicts_that_class() {
        let x = array![[0.0], [1.0]];
        let y = array![2.0, 2.0];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&array![[5.0]]).unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn test_regressor_tracks_linear_trend() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(|v| 3.0 * v);
        let config = SVMConfig::default().with_c(100.0).with_gamma(1.0);
        let mut svr = SVMRegressor::new(config);
        svr.fit(&x, &y).unwrap();
        let pred = svr.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 3.0).abs() < 0.5, "{}", pred[0]);
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let mut svm = SVMRegressor::new(SVMConfig::default().with_c(-1.0));
        let result = svm.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]);
        assert!(matches!(result, Err(SelectError::InvalidParameter { .. })));
    }
}
