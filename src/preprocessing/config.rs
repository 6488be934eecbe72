//! Preprocessing configuration

use super::ScalerType;
use serde::{Deserialize, Serialize};

/// Configuration for the transformation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Label substituted for missing categorical values
    pub categorical_fill: String,

    /// Scaler applied to numerical features after imputation
    pub scaler_type: ScalerType,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            categorical_fill: "missing".to_string(),
            scaler_type: ScalerType::Standard,
        }
    }
}

impl PreprocessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categorical_fill(mut self, fill: impl Into<String>) -> Self {
        self.categorical_fill = fill.into();
        self
    }

    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }
}
