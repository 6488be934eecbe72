//! The persisted unit of one trained model family

use crate::dataset::Scalar;
use crate::error::Result;
use crate::optimizer::TrialParams;
use crate::preprocessing::TransformPipeline;
use crate::training::{Estimator, ModelFamily, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fitted model together with everything needed to replay it on new rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedBundle {
    pub family: ModelFamily,
    pub task: TaskType,
    pub model: Estimator,
    /// The same fitted pipeline the search ran on
    pub pipeline: TransformPipeline,
    /// Original class labels in encoding order; `None` for regression
    pub label_classes: Option<Vec<Scalar>>,
    /// Post-transform feature names, in matrix column order
    pub feature_names: Vec<String>,
    pub best_params: TrialParams,
    pub best_score: f64,
    pub trained_at: DateTime<Utc>,
    /// SHA-256 of the training data
    pub data_fingerprint: String,
}

impl TrainedBundle {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Name under which the bundle is exported
    pub fn export_name(family: ModelFamily) -> String {
        format!("{}_model.json", family)
    }
}
