//! Model training module
//!
//! Provides the model side of the selection service:
//! - Task and training-run configuration
//! - K-fold and stratified cross-validation splitters
//! - Native model families: linear and logistic regression, random
//!   forests, kernel SVM and SVR, k-nearest neighbours, and two gradient
//!   boosting variants (depth-wise and leaf-wise)
//! - The candidate registry mapping each family to a constructor and a
//!   search space
//! - The orchestrator that searches every family and persists bundles

mod config;
mod engine;
pub mod boosting;
pub mod cross_validation;
pub mod decision_tree;
pub mod knn;
pub mod lightgbm;
pub mod linear_models;
pub mod models;
pub mod random_forest;
pub mod registry;
pub mod svm;
pub mod xgboost;

pub use config::{TaskType, TrainingConfig};
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use engine::{check_class_balance, FamilyResult, TrainingOrchestrator, TrainingReport};
pub use models::{accuracy, mean_squared_error, Estimator, Model, ModelMetrics, Scoring};
pub use registry::{candidate, catalog, Candidate, ModelFamily};
