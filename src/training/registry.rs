//! Model candidate registry
//!
//! A static table per task: family tag, constructor function and search
//! space. The registry never instantiates models itself.

use super::config::TaskType;
use super::knn::{KNNConfig, KNN};
use super::lightgbm::{LightGBM, LightGBMConfig};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::models::Estimator;
use super::random_forest::RandomForest;
use super::svm::{SVMClassifier, SVMConfig, SVMRegressor};
use super::xgboost::{XGBoost, XGBoostConfig};
use crate::error::{Result, SelectError};
use crate::optimizer::{Constructor, SearchSpace, TrialParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "logistic_regression")]
    LogisticRegression,
    #[serde(rename = "linear_regression")]
    LinearRegression,
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "svm")]
    Svm,
    #[serde(rename = "svr")]
    Svr,
    #[serde(rename = "knn")]
    Knn,
    #[serde(rename = "lightgbm")]
    LightGbm,
    #[serde(rename = "xgboost")]
    XgBoost,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::LogisticRegression,
        ModelFamily::LinearRegression,
        ModelFamily::RandomForest,
        ModelFamily::Svm,
        ModelFamily::Svr,
        ModelFamily::Knn,
        ModelFamily::LightGbm,
        ModelFamily::XgBoost,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Svm => "svm",
            ModelFamily::Svr => "svr",
            ModelFamily::Knn => "knn",
            ModelFamily::LightGbm => "lightgbm",
            ModelFamily::XgBoost => "xgboost",
        }
    }

    pub fn supports(&self, task: TaskType) -> bool {
        catalog(task).iter().any(|c| c.family == *self)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| SelectError::ModelNotFound(s.to_string()))
    }
}

/// One catalog entry
#[derive(Debug, Clone)]
pub struct Candidate {
    pub family: ModelFamily,
    pub constructor: Constructor,
    pub search_space: SearchSpace,
}

fn entry(family: ModelFamily, constructor: Constructor, search_space: SearchSpace) -> Candidate {
    Candidate {
        family,
        constructor,
        search_space,
    }
}

fn forest_space() -> SearchSpace {
    SearchSpace::new()
        .int("n_estimators", 50, 300)
        .int("max_depth", 3, 15)
        .int("min_samples_split", 2, 20)
}

fn svm_space() -> SearchSpace {
    SearchSpace::new().log_float("C", 0.01, 100.0).log_float("gamma", 0.001, 1.0)
}

fn lightgbm_space() -> SearchSpace {
    SearchSpace::new()
        .int("num_leaves", 20, 100)
        .log_float("learning_rate", 0.01, 0.3)
        .int("n_estimators", 50, 300)
}

fn xgboost_space() -> SearchSpace {
    SearchSpace::new()
        .int("max_depth", 3, 15)
        .log_float("learning_rate", 0.01, 0.3)
        .int("n_estimators", 50, 300)
}

/// Ordered catalog of candidate families for a task
pub fn catalog(task: TaskType) -> Vec<Candidate> {
    match task {
        TaskType::Classification => vec![
            entry(
                ModelFamily::LogisticRegression,
                build_logistic_regression,
                SearchSpace::new()
                    .log_float("C", 0.01, 100.0)
                    .int("max_iter", 100, 500),
            ),
            entry(ModelFamily::RandomForest, build_forest_classifier, forest_space()),
            entry(ModelFamily::Svm, build_svc, svm_space()),
            entry(
                ModelFamily::Knn,
                build_knn_classifier,
                SearchSpace::new().int("n_neighbors", 3, 15).int("leaf_size", 20, 50),
            ),
            entry(ModelFamily::LightGbm, build_lightgbm_classifier, lightgbm_space()),
            entry(ModelFamily::XgBoost, build_xgboost_classifier, xgboost_space()),
        ],
        TaskType::Regression => vec![
            entry(ModelFamily::LinearRegression, build_linear_regression, SearchSpace::new()),
            entry(ModelFamily::RandomForest, build_forest_regressor, forest_space()),
            entry(ModelFamily::Svr, build_svr, svm_space()),
            entry(ModelFamily::LightGbm, build_lightgbm_regressor, lightgbm_space()),
            entry(ModelFamily::XgBoost, build_xgboost_regressor, xgboost_space()),
        ],
    }
}

/// Look up one family's entry for a task
pub fn candidate(task: TaskType, family: ModelFamily) -> Result<Candidate> {
    catalog(task)
        .into_iter()
        .find(|c| c.family == family)
        .ok_or_else(|| SelectError::Configuration(format!("family '{}' does not support {}", family, task)))
}

fn float_param(params: &TrialParams, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(|v| v.as_float())
        .ok_or_else(|| SelectError::invalid_param(name, "<missing>", "required hyperparameter"))
}

fn usize_param(params: &TrialParams, name: &str) -> Result<usize> {
    let value = params
        .get(name)
        .and_then(|v| v.as_int())
        .ok_or_else(|| SelectError::invalid_param(name, "<missing>", "required hyperparameter"))?;
    usize::try_from(value).map_err(|_| SelectError::invalid_param(name, value, "must be non-negative"))
}

fn build_logistic_regression(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::LogisticRegression(
        LogisticRegression::new()
            .with_c(float_param(params, "C")?)
            .with_max_iter(usize_param(params, "max_iter")?),
    ))
}

fn build_linear_regression(_params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::LinearRegression(LinearRegression::new()))
}

fn forest(base: RandomForest, params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::RandomForest(
        base.with_max_depth(usize_param(params, "max_depth")?)
            .with_min_samples_split(usize_param(params, "min_samples_split")?),
    ))
}

fn build_forest_classifier(params: &TrialParams) -> Result<Estimator> {
    forest(RandomForest::new_classifier(usize_param(params, "n_estimators")?), params)
}

fn build_forest_regressor(params: &TrialParams) -> Result<Estimator> {
    forest(RandomForest::new_regressor(usize_param(params, "n_estimators")?), params)
}

fn svm_config(params: &TrialParams) -> Result<SVMConfig> {
    Ok(SVMConfig::default()
        .with_c(float_param(params, "C")?)
        .with_gamma(float_param(params, "gamma")?))
}

fn build_svc(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::SupportVectorClassifier(SVMClassifier::new(svm_config(params)?)))
}

fn build_svr(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::SupportVectorRegressor(SVMRegressor::new(svm_config(params)?)))
}

fn build_knn_classifier(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::KNN(KNN::classifier(KNNConfig {
        n_neighbors: usize_param(params, "n_neighbors")?,
        leaf_size: usize_param(params, "leaf_size")?,
    })))
}

fn lightgbm_config(params: &TrialParams) -> Result<LightGBMConfig> {
    Ok(LightGBMConfig {
        num_leaves: usize_param(params, "num_leaves")?,
        learning_rate: float_param(params, "learning_rate")?,
        n_estimators: usize_param(params, "n_estimators")?,
        ..Default::default()
    })
}

fn build_lightgbm_classifier(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::LightGBM(LightGBM::classifier(lightgbm_config(params)?)))
}

fn build_lightgbm_regressor(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::LightGBM(LightGBM::regressor(lightgbm_config(params)?)))
}

fn xgboost_config(params: &TrialParams) -> Result<XGBoostConfig> {
    Ok(XGBoostConfig {
        max_depth: usize_param(params, "max_depth")?,
        learning_rate: float_param(params, "learning_rate")?,
        n_estimators: usize_param(params, "n_estimators")?,
        ..Default::default()
    })
}

fn build_xgboost_classifier(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::XGBoost(XGBoost::classifier(xgboost_config(params)?)))
}

fn build_xgboost_regressor(params: &TrialParams) -> Result<Estimator> {
    Ok(Estimator::XGBoost(XGBoost::regressor(xgboost_config(params)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_catalog_names_and_order() {
        let names: Vec<_> = catalog(TaskType::Classification).iter().map(|c| c.family.name()).collect();
        assert_eq!(
            names,
            vec!["logistic_regression", "random_forest", "svm", "knn", "lightgbm", "xgboost"]
        );
        let names: Vec<_> = catalog(TaskType::Regression).iter().map(|c| c.family.name()).collect();
        assert_eq!(names, vec!["linear_regression", "random_forest", "svr", "lightgbm", "xgboost"]);
    }

    #[test]
    fn test_every_constructor_accepts_its_own_space() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        for task in [TaskType::Classification, TaskType::Regression] {
            for candidate in catalog(task) {
                candidate.search_space.validate().unwrap();
                let params = candidate.search_space.sample(&mut rng);
                assert!((candidate.constructor)(&params).is_ok(), "{}", candidate.family);
            }
        }
    }

    #[test]
    fn test_missing_param_is_rejected() {
        let result = build_svc(&TrialParams::new());
        assert!(matches!(result, Err(SelectError::InvalidParameter { .. })));
    }

    #[test]
    fn test_family_parsing_and_support() {
        assert_eq!("lightgbm".parse::<ModelFamily>().unwrap(), ModelFamily::LightGbm);
        assert!("neural_net".parse::<ModelFamily>().is_err());
        assert!(ModelFamily::Svr.supports(TaskType::Regression));
        assert!(!ModelFamily::Svr.supports(TaskType::Classification));
        assert_eq!(serde_json::to_string(&ModelFamily::XgBoost).unwrap(), "\"xgboost\"");
    }

    #[test]
    fn test_linear_regression_space_is_empty() {
        let entry = candidate(TaskType::Regression, ModelFamily::LinearRegression).unwrap();
        assert!(entry.search_space.is_empty());
    }
}
