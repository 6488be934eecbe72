//! Hyperparameter optimization module
//!
//! Provides the search machinery used per model family:
//! - Search spaces of uniform integer and log-uniform float ranges
//! - Random and Tree-structured Parzen Estimator (TPE) samplers
//! - Studies recording every trial, failed ones included
//! - `BayesianSearch`, which scores trials by k-fold cross-validation

mod config;
mod optimizer;
mod samplers;
mod search_space;
mod study;

pub use config::{OptimizeDirection, SearchConfig};
pub use optimizer::{BayesianSearch, Constructor, SearchResult, SearchState};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler, TpeConfig};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use study::{HistoryRecord, Study, Trial, TrialOutcome};
