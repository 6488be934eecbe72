//! Inference service

use crate::dataset::{Dataset, Record, Scalar};
use crate::error::Result;
use crate::export::{BundleStore, TrainedBundle};
use crate::training::{Model, ModelFamily};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Replays persisted bundles on new rows
pub struct InferenceService {
    store: Arc<dyn BundleStore>,
}

impl InferenceService {
    pub fn new(store: Arc<dyn BundleStore>) -> Self {
        Self { store }
    }

    /// Load the bundle persisted for `family`
    pub fn load(&self, family: ModelFamily) -> Result<TrainedBundle> {
        self.store.get(family)
    }

    /// Predict in original label space for classification, raw numbers for
    /// regression. Fails with `ModelNotFound` when the family was never
    /// trained.
    pub fn predict(&self, family: ModelFamily, rows: &Dataset) -> Result<Vec<Scalar>> {
        let bundle = self.load(family)?;
        Self::predict_with(&bundle, rows)
    }

    pub fn predict_records(&self, family: ModelFamily, records: &[Record]) -> Result<Vec<Scalar>> {
        self.predict(family, &Dataset::from_records(records)?)
    }

    /// Run an already loaded bundle
    pub fn predict_with(bundle: &TrainedBundle, rows: &Dataset) -> Result<Vec<Scalar>> {
        let start = Instant::now();
        let transformed = bundle.pipeline.transform(rows, None)?;
        let raw = bundle.model.predict(&transformed.x)?;
        let predictions = match &bundle.label_classes {
            Some(_) => bundle.pipeline.inverse_transform_target(&raw.to_vec())?,
            None => raw.iter().map(|&v| Scalar::Number(v)).collect(),
        };
        debug!(
            family = %bundle.family,
            rows = rows.n_rows(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "prediction served"
        );
        Ok(predictions)
    }
}
