//! Model trait, the estimator enum and evaluation metrics

use super::config::TaskType;
use super::knn::KNN;
use super::lightgbm::LightGBM;
use super::linear_models::{LinearRegression, LogisticRegression};
use super::random_forest::RandomForest;
use super::svm::{SVMClassifier, SVMRegressor};
use super::xgboost::XGBoost;
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait for ML models
///
/// Classifiers take targets encoded as `0.0, 1.0, ..., k-1` and predict in
/// the same space.
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// A concrete model of any registered family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "model")]
pub enum Estimator {
    LinearRegression(LinearRegression),
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    SupportVectorClassifier(SVMClassifier),
    SupportVectorRegressor(SVMRegressor),
    KNN(KNN),
    XGBoost(XGBoost),
    LightGBM(LightGBM),
}

impl Estimator {
    fn inner(&self) -> &dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::SupportVectorClassifier(m) => m,
            Estimator::SupportVectorRegressor(m) => m,
            Estimator::KNN(m) => m,
            Estimator::XGBoost(m) => m,
            Estimator::LightGBM(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::SupportVectorClassifier(m) => m,
            Estimator::SupportVectorRegressor(m) => m,
            Estimator::KNN(m) => m,
            Estimator::XGBoost(m) => m,
            Estimator::LightGBM(m) => m,
        }
    }
}

impl Model for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Reject empty inputs and mismatched row counts
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SelectError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(SelectError::Data("cannot fit on an empty matrix".to_string()));
    }
    Ok(())
}

/// Reject prediction inputs whose width differs from the training data
pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(SelectError::Shape {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Number of classes implied by an encoded target
pub(crate) fn class_count(y: &Array1<f64>) -> Result<usize> {
    let mut max = 0usize;
    for &v in y.iter() {
        if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
            return Err(SelectError::Data(format!(
                "class labels must be encoded as non-negative integers, found {}",
                v
            )));
        }
        max = max.max(v as usize);
    }
    Ok(max + 1)
}

pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

/// Score used to rank trials. Higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scoring {
    Accuracy,
    NegMeanSquaredError,
}

impl Scoring {
    pub fn for_task(task: TaskType) -> Self {
        match task {
            TaskType::Classification => Scoring::Accuracy,
            TaskType::Regression => Scoring::NegMeanSquaredError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::NegMeanSquaredError => "neg_mean_squared_error",
        }
    }

    pub fn score(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        match self {
            Scoring::Accuracy => accuracy(y_true, y_pred),
            Scoring::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
        }
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Metrics for model evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: Option<f64>,
    /// Support-weighted over classes
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub n_samples: usize,
}

impl ModelMetrics {
    pub fn compute(task: TaskType, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        match task {
            TaskType::Classification => Self::compute_classification(y_true, y_pred),
            TaskType::Regression => Self::compute_regression(y_true, y_pred),
        }
    }

    /// Accuracy plus support-weighted precision, recall and F1
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        // (true positives, predicted count, actual count) per class
        let mut counts: BTreeMap<i64, (usize, usize, usize)> = BTreeMap::new();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (t, p) = (t.round() as i64, p.round() as i64);
            counts.entry(t).or_default().2 += 1;
            counts.entry(p).or_default().1 += 1;
            if t == p {
                counts.entry(t).or_default().0 += 1;
            }
        }

        let total = y_true.len() as f64;
        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        if total > 0.0 {
            for &(tp, predicted, actual) in counts.values() {
                if actual == 0 {
                    continue;
                }
                let weight = actual as f64 / total;
                let p = if predicted > 0 { tp as f64 / predicted as f64 } else { 0.0 };
                let r = tp as f64 / actual as f64;
                precision += weight * p;
                recall += weight * r;
                if p + r > 0.0 {
                    f1 += weight * 2.0 * p * r / (p + r);
                }
            }
        }

        Self {
            accuracy: Some(accuracy(y_true, y_pred)),
            precision: Some(precision),
            recall: Some(recall),
            f1_score: Some(f1),
            n_samples: y_true.len(),
            ..Default::default()
        }
    }

    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        let mse = mean_squared_error(y_true, y_pred);
        let mae = if n > 0.0 {
            y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).abs()).sum::<f64>() / n
        } else {
            0.0
        };

        let y_mean = y_true.mean().unwrap_or(0.0);
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - mse * n / ss_tot } else { 0.0 };

        Self {
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            mae: Some(mae),
            r2: Some(r2),
            n_samples: y_true.len(),
            ..Default::default()
        }
    }
}
