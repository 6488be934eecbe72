//! Data preprocessing module
//!
//! Feature classification and the fitted transformation pipeline:
//! - Mean imputation and standard scaling for numerical columns
//! - Constant-fill imputation and one-hot encoding for categorical columns
//! - Label encoding for classification targets

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use config::PreprocessingConfig;
pub use encoder::{LabelEncoding, OneHotEncoder};
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::{Transformed, TransformPipeline};
pub use scaler::{Scaler, ScalerType};

use crate::dataset::{Dataset, ValueKind};
use serde::{Deserialize, Serialize};

/// Kind assigned to a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numerical,
    Categorical,
}

/// Partition of feature columns, derived once per training run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub numerical: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureSpec {
    pub fn new(numerical: Vec<String>, categorical: Vec<String>) -> Self {
        Self {
            numerical,
            categorical,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numerical.is_empty() && self.categorical.is_empty()
    }

    pub fn len(&self) -> usize {
        self.numerical.len() + self.categorical.len()
    }

    pub fn kind_of(&self, column: &str) -> Option<FeatureKind> {
        if self.numerical.iter().any(|c| c == column) {
            Some(FeatureKind::Numerical)
        } else if self.categorical.iter().any(|c| c == column) {
            Some(FeatureKind::Categorical)
        } else {
            None
        }
    }
}

/// Partition the columns of `x` by observed value type.
/// Only purely numeric columns are numerical; text, boolean, mixed
/// and all-missing columns are categorical.
pub fn classify_features(x: &Dataset) -> FeatureSpec {
    let mut spec = FeatureSpec::default();
    for column in x.columns() {
        match column.observed_kind() {
            ValueKind::Numeric => spec.numerical.push(column.name().to_string()),
            ValueKind::Text | ValueKind::Boolean | ValueKind::Mixed | ValueKind::Empty => {
                spec.categorical.push(column.name().to_string())
            }
        }
    }
    spec
}
