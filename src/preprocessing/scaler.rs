//! Feature scaling

use crate::error::{Result, SelectError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Feature scaler keyed by column name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit one column. Uses the population standard deviation; a constant
    /// column gets scale 1.
    pub fn fit_column(&mut self, name: &str, values: &[f64]) -> &mut Self {
        let params = match self.scaler_type {
            ScalerType::Standard if !values.is_empty() => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
                }
            }
            _ => ScalerParams { center: 0.0, scale: 1.0 },
        };
        self.params.insert(name.to_string(), params);
        self.is_fitted = true;
        self
    }

    pub fn transform_column(&self, name: &str, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.params_for(name)?;
        Ok(values.iter().map(|v| (v - params.center) / params.scale).collect())
    }

    pub fn inverse_transform_column(&self, name: &str, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.params_for(name)?;
        Ok(values.iter().map(|v| v * params.scale + params.center).collect())
    }

    fn params_for(&self, name: &str) -> Result<&ScalerParams> {
        if !self.is_fitted {
            return Err(SelectError::NotFitted("scaler".to_string()));
        }
        self.params
            .get(name)
            .ok_or_else(|| SelectError::Data(format!("scaler was not fitted on column '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit_column("x", &[1.0, 2.0, 3.0]);
        let scaled = scaler.transform_column("x", &[1.0, 2.0, 3.0]).unwrap();
        let mean: f64 = scaled.iter().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        let var: f64 = scaled.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit_column("c", &[5.0, 5.0]);
        assert_eq!(scaler.transform_column("c", &[5.0, 6.0]).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_inverse_transform() {
        let mut scaler = Scaler::new(ScalerType::Standard);
        scaler.fit_column("x", &[2.0, 4.0, 9.0]);
        let scaled = scaler.transform_column("x", &[3.0]).unwrap();
        let back = scaler.inverse_transform_column("x", &scaled).unwrap();
        assert!((back[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_not_fitted() {
        let scaler = Scaler::new(ScalerType::Standard);
        assert!(matches!(
            scaler.transform_column("x", &[1.0]),
            Err(SelectError::NotFitted(_))
        ));
    }

    #[test]
    fn test_none_scaler_is_identity() {
        let mut scaler = Scaler::new(ScalerType::None);
        scaler.fit_column("x", &[10.0, 20.0]);
        assert_eq!(scaler.transform_column("x", &[10.0, 20.0]).unwrap(), vec![10.0, 20.0]);
    }
}
