//! Search space definition for hyperparameters
//!
//! Each hyperparameter is a box-constrained range: integers are sampled
//! uniformly over `[low, high]`, continuous values log-uniformly.

use crate::error::{Result, SelectError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Range of one hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Inclusive integer range, uniform sampling
    Int { low: i64, high: i64 },
    /// Positive continuous range, log-uniform sampling
    LogFloat { low: f64, high: f64 },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::LogFloat { low, high },
        }
    }

    /// Reject empty or non-positive ranges
    pub fn validate(&self) -> Result<()> {
        match self.param_type {
            ParameterType::Int { low, high } if low > high => Err(SelectError::invalid_param(
                &self.name,
                format!("[{}, {}]", low, high),
                "lower bound exceeds upper bound",
            )),
            ParameterType::LogFloat { low, high } if !(low > 0.0 && low <= high) => {
                Err(SelectError::invalid_param(
                    &self.name,
                    format!("[{}, {}]", low, high),
                    "log-uniform range needs 0 < low <= high",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self.param_type {
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(low..=high)),
            ParameterType::LogFloat { low, high } => {
                let log_low = low.ln();
                let log_high = high.ln();
                let val = (rng.gen::<f64>() * (log_high - log_low) + log_low).exp();
                ParameterValue::Float(val.clamp(low, high))
            }
        }
    }

    /// Map a value into the unit interval the samplers model in
    pub fn normalize(&self, value: &ParameterValue) -> f64 {
        let unit = match self.param_type {
            ParameterType::Int { low, high } => {
                let v = value.as_int().unwrap_or(low);
                let width = (high - low + 1) as f64;
                ((v - low) as f64 + 0.5) / width
            }
            ParameterType::LogFloat { low, high } => {
                let v = value.as_float().unwrap_or(low).max(low);
                let span = high.ln() - low.ln();
                if span <= 0.0 {
                    0.5
                } else {
                    (v.ln() - low.ln()) / span
                }
            }
        };
        unit.clamp(0.0, 1.0)
    }

    /// Inverse of [`Parameter::normalize`]
    pub fn denormalize(&self, unit: f64) -> ParameterValue {
        let unit = unit.clamp(0.0, 1.0);
        match self.param_type {
            ParameterType::Int { low, high } => {
                let width = (high - low + 1) as f64;
                let v = low + (unit * width).floor() as i64;
                ParameterValue::Int(v.clamp(low, high))
            }
            ParameterType::LogFloat { low, high } => {
                let v = (low.ln() + unit * (high.ln() - low.ln())).exp();
                ParameterValue::Float(v.clamp(low, high))
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(v.round() as i64),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param_type {
            ParameterType::Int { low, high } => write!(f, "{}: int {}..={}", self.name, low, high),
            ParameterType::LogFloat { low, high } => write!(f, "{}: log {}..{}", self.name, low, high),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
        }
    }
}

/// One sampled assignment, ordered by name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a uniform integer range
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a log-uniform continuous range
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}
