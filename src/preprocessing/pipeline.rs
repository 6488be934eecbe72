//! Transformation pipeline
//!
//! Imputes, scales and one-hot encodes a [`Dataset`] into a dense
//! feature matrix, and label-encodes a classification target. A pipeline
//! is fitted exactly once and can then be replayed on any number of
//! datasets with the same columns.

use super::{
    config::PreprocessingConfig,
    encoder::{LabelEncoding, OneHotEncoder},
    imputer::{ImputeStrategy, Imputer},
    scaler::Scaler,
    FeatureSpec,
};
use crate::dataset::{Column, Dataset, Scalar};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Output of a pipeline pass
#[derive(Debug, Clone)]
pub struct Transformed {
    pub x: Array2<f64>,
    /// Encoded target, present when a target column was supplied
    pub y: Option<Array1<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformPipeline {
    config: PreprocessingConfig,
    features: FeatureSpec,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    scaler: Scaler,
    encoder: OneHotEncoder,
    label_encoding: Option<LabelEncoding>,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}

impl TransformPipeline {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self {
            numeric_imputer: Imputer::new(ImputeStrategy::Mean),
            categorical_imputer: Imputer::new(ImputeStrategy::ConstantString(
                config.categorical_fill.clone(),
            )),
            scaler: Scaler::new(config.scaler_type.clone()),
            encoder: OneHotEncoder::new(),
            config,
            features: FeatureSpec::default(),
            label_encoding: None,
            feature_names: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit every transform on `x` (and a label encoding on `y` when given),
    /// then return the transformed data.
    pub fn fit_transform(
        &mut self,
        x: &Dataset,
        y: Option<&Column>,
        features: &FeatureSpec,
    ) -> Result<Transformed> {
        if self.is_fitted {
            return Err(SelectError::Configuration(
                "transformation pipeline is already fitted".to_string(),
            ));
        }
        if features.is_empty() {
            return Err(SelectError::Configuration(
                "no numerical or categorical features were given".to_string(),
            ));
        }
        let numerical: HashSet<&str> = features.numerical.iter().map(String::as_str).collect();
        if let Some(both) = features.categorical.iter().find(|c| numerical.contains(c.as_str())) {
            return Err(SelectError::Configuration(format!(
                "column '{}' is listed as both numerical and categorical",
                both
            )));
        }

        let numeric_cols = features
            .numerical
            .iter()
            .map(|name| x.require(name))
            .collect::<Result<Vec<_>>>()?;
        let categorical_cols = features
            .categorical
            .iter()
            .map(|name| x.require(name))
            .collect::<Result<Vec<_>>>()?;

        self.numeric_imputer.fit(&numeric_cols)?;
        for column in &numeric_cols {
            let imputed = self.numeric_imputer.impute_numeric(column)?;
            self.scaler.fit_column(column.name(), &imputed);
        }

        self.categorical_imputer.fit(&categorical_cols)?;
        for column in &categorical_cols {
            let keys = self.categorical_imputer.impute_categorical(column)?;
            self.encoder.fit_column(column, &keys);
        }

        if let Some(y) = y {
            self.label_encoding = Some(LabelEncoding::fit(y)?);
        }

        self.features = features.clone();
        self.feature_names = self.build_feature_names();
        self.is_fitted = true;
        debug!(
            numerical = features.numerical.len(),
            categorical = features.categorical.len(),
            outputs = self.feature_names.len(),
            "fitted transformation pipeline"
        );

        self.transform(x, y)
    }

    /// Apply the fitted transforms. Unseen categories become all-zero blocks.
    pub fn transform(&self, x: &Dataset, y: Option<&Column>) -> Result<Transformed> {
        if !self.is_fitted {
            return Err(SelectError::NotFitted("transformation pipeline".to_string()));
        }

        let n_rows = x.n_rows();
        let mut out = Array2::zeros((n_rows, self.feature_names.len()));
        let mut offset = 0;

        for name in &self.features.numerical {
            let column = x.require(name)?;
            let imputed = self.numeric_imputer.impute_numeric(column)?;
            let scaled = self.scaler.transform_column(name, &imputed)?;
            for (row, value) in scaled.into_iter().enumerate() {
                out[[row, offset]] = value;
            }
            offset += 1;
        }

        for name in &self.features.categorical {
            let column = x.require(name)?;
            let keys = self.categorical_imputer.impute_categorical(column)?;
            for (row, pos) in self.encoder.positions(name, &keys)?.into_iter().enumerate() {
                if let Some(pos) = pos {
                    out[[row, offset + pos]] = 1.0;
                }
            }
            offset += self.encoder.width(name);
        }

        let y = match y {
            None => None,
            Some(y) if y.len() != n_rows => {
                return Err(SelectError::Shape {
                    expected: format!("target length = {}", n_rows),
                    actual: format!("target length = {}", y.len()),
                })
            }
            Some(y) => Some(self.encode_target(y)?),
        };

        Ok(Transformed { x: out, y })
    }

    fn encode_target(&self, y: &Column) -> Result<Array1<f64>> {
        match &self.label_encoding {
            Some(encoding) => encoding.encode(y.values()),
            None => y
                .values()
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        SelectError::Data(format!(
                            "target '{}' must be numeric, found {:?}",
                            y.name(),
                            v
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
                .map(Array1::from_vec),
        }
    }

    /// Map encoded predictions back to original labels; numbers pass
    /// through unchanged when no label encoding was fitted.
    pub fn inverse_transform_target(&self, y_encoded: &[f64]) -> Result<Vec<Scalar>> {
        match &self.label_encoding {
            Some(encoding) => encoding.decode(y_encoded),
            None => Ok(y_encoded.iter().map(|&v| Scalar::Number(v)).collect()),
        }
    }

    /// Output column names, in matrix order
    pub fn get_feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_classes(&self) -> Option<&[Scalar]> {
        self.label_encoding.as_ref().map(|e| e.classes())
    }

    pub fn features(&self) -> &FeatureSpec {
        &self.features
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn build_feature_names(&self) -> Vec<String> {
        let mut names = self.features.numerical.clone();
        for column in &self.features.categorical {
            if let Some(categories) = self.encoder.categories(column) {
                names.extend(categories.iter().map(|c| format!("{}_{}", column, c)));
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::classify_features;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("area", &[Some(50.0), Some(70.0), None, Some(90.0)]),
            Column::text("zone", &[Some("north"), Some("south"), Some("north"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_fit_transform_shape_and_names() {
        let ds = sample();
        let spec = classify_features(&ds);
        let mut pipeline = TransformPipeline::default();
        let out = pipeline.fit_transform(&ds, None, &spec).unwrap();

        assert_eq!(out.x.dim(), (4, 4));
        assert_eq!(
            pipeline.get_feature_names(),
            &["area", "zone_north", "zone_south", "zone_missing"]
        );
        // Imputed row lands on the mean, which scales to zero
        assert!(out.x[[2, 0]].abs() < 1e-12);
        assert_eq!(out.x[[3, 3]], 1.0);
        assert!(out.y.is_none());
    }

    #[test]
    fn test_transform_matches_fit_transform() {
        let ds = sample();
        let spec = classify_features(&ds);
        let mut pipeline = TransformPipeline::default();
        let fitted = pipeline.fit_transform(&ds, None, &spec).unwrap();
        let replayed = pipeline.transform(&ds, None).unwrap();
        assert_eq!(fitted.x, replayed.x);
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let ds = sample();
        let spec = classify_features(&ds);
        let mut pipeline = TransformPipeline::default();
        pipeline.fit_transform(&ds, None, &spec).unwrap();

        let new_rows = Dataset::new(vec![
            Column::numeric("area", &[Some(60.0)]),
            Column::text("zone", &[Some("east")]),
        ])
        .unwrap();
        let out = pipeline.transform(&new_rows, None).unwrap();
        assert_eq!(out.x.row(0).slice(ndarray::s![1..]).sum(), 0.0);
    }

    #[test]
    fn test_transform_before_fit() {
        let pipeline = TransformPipeline::default();
        assert!(matches!(
            pipeline.transform(&sample(), None),
            Err(SelectError::NotFitted(_))
        ));
    }

    #[test]
    fn test_fit_only_once() {
        let ds = sample();
        let spec = classify_features(&ds);
        let mut pipeline = TransformPipeline::default();
        pipeline.fit_transform(&ds, None, &spec).unwrap();
        assert!(matches!(
            pipeline.fit_transform(&ds, None, &spec),
            Err(SelectError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_feature_lists() {
        let mut pipeline = TransformPipeline::default();
        let result = pipeline.fit_transform(&sample(), None, &FeatureSpec::default());
        assert!(matches!(result, Err(SelectError::Configuration(_))));
    }

    #[test]
    fn test_overlapping_feature_lists() {
        let spec = FeatureSpec::new(vec!["area".into()], vec!["area".into()]);
        let mut pipeline = TransformPipeline::default();
        assert!(matches!(
            pipeline.fit_transform(&sample(), None, &spec),
            Err(SelectError::Configuration(_))
        ));
    }

    #[test]
    fn test_label_encoding_and_inverse() {
        let ds = sample();
        let y = Column::text("label", &[Some("yes"), Some("no"), Some("yes"), Some("no")]);
        let spec = classify_features(&ds);
        let mut pipeline = TransformPipeline::default();
        let out = pipeline.fit_transform(&ds, Some(&y), &spec).unwrap();

        let encoded = out.y.unwrap();
        assert_eq!(encoded.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        let decoded = pipeline.inverse_transform_target(&[0.0, 1.0]).unwrap();
        assert_eq!(decoded, vec![Scalar::from("no"), Scalar::from("yes")]);
        assert_eq!(pipeline.label_classes().unwrap().len(), 2);
    }

    #[test]
    fn test_inverse_without_encoding_is_passthrough() {
        let pipeline = TransformPipeline::default();
        let out = pipeline.inverse_transform_target(&[1.5, -2.0]).unwrap();
        assert_eq!(out, vec![Scalar::Number(1.5), Scalar::Number(-2.0)]);
    }
}
