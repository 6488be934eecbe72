//! Kolosal Select - automated model selection
//!
//! Given a tabular dataset, a target column and a task type, the crate
//! classifies and transforms the features, runs a cross-validated
//! Bayesian hyperparameter search for every candidate model family,
//! persists the best model of each family and serves predictions from
//! the persisted bundles.
//!
//! # Modules
//!
//! - [`dataset`] - Column-oriented datasets and scalar values
//! - [`preprocessing`] - Feature classification and the transformation pipeline
//! - [`optimizer`] - Search spaces, samplers, studies and the search engine
//! - [`training`] - Model families, the candidate registry and the orchestrator
//! - [`export`] - Trained bundles and the keyed bundle store
//! - [`inference`] - Predictions from persisted bundles
//! - [`utils`] - CSV / JSON / Parquet loading
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod dataset;

// Core ML modules
pub mod preprocessing;
pub mod optimizer;
pub mod training;
pub mod inference;

// Persistence
pub mod export;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, SelectError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SelectError};

    // Data
    pub use crate::dataset::{Column, Dataset, Record, Scalar};
    pub use crate::utils::DataLoader;

    // Preprocessing
    pub use crate::preprocessing::{classify_features, FeatureSpec, PreprocessingConfig, TransformPipeline};

    // Optimization
    pub use crate::optimizer::{BayesianSearch, SamplerType, SearchConfig, SearchSpace, TrialParams};

    // Training
    pub use crate::training::{
        Estimator, Model, ModelFamily, TaskType, TrainingConfig, TrainingOrchestrator, TrainingReport,
    };

    // Persistence and inference
    pub use crate::export::{BundleStore, FileBundleStore, MemoryBundleStore, TrainedBundle};
    pub use crate::inference::InferenceService;
}
