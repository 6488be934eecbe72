//! Error types for kolosal-select

use thiserror::Error;

/// Result type alias for model-selection operations
pub type Result<T> = std::result::Result<T, SelectError>;

/// Main error type for the model-selection service
#[derive(Error, Debug)]
pub enum SelectError {
    /// Missing or contradictory feature lists, invalid run settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A fitted component was used before being fitted
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// The target column failed a data-quality gate
    #[error("Data quality error: {0}")]
    DataQuality(String),

    /// Refitting the best configuration on the full data failed
    #[error("Training error: {0}")]
    Training(String),

    /// Every candidate family failed; carries one reason per family
    #[error("All models failed to train: {}", format_failures(.0))]
    AllModelsFailed(Vec<(String, String)>),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Optimization history was requested before any search completed
    #[error("Search has not been run: {0}")]
    NotRun(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SelectError {
    /// True when the caller supplied unusable input, as opposed to the
    /// search finding no usable model.
    pub fn is_data_problem(&self) -> bool {
        matches!(
            self,
            SelectError::DataQuality(_) | SelectError::Data(_) | SelectError::Configuration(_)
        )
    }

    pub(crate) fn invalid_param(name: &str, value: impl ToString, reason: &str) -> Self {
        SelectError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no candidate families were registered".to_string();
    }
    failures
        .iter()
        .map(|(family, reason)| format!("{}: {}", family, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<polars::error::PolarsError> for SelectError {
    fn from(err: polars::error::PolarsError) -> Self {
        SelectError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for SelectError {
    fn from(err: serde_json::Error) -> Self {
        SelectError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SelectError {
    fn from(err: ndarray::ShapeError) -> Self {
        SelectError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
