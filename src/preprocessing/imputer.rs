//! Missing value imputation

use crate::dataset::{Column, Scalar};
use crate::error::{Result, SelectError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the column mean (numeric only)
    Mean,
    /// Replace with a constant label (categorical)
    ConstantString(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Per-column imputer, fitted once on training columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Learn fill values. A numeric column with no observed values fills with 0.
    pub fn fit(&mut self, columns: &[&Column]) -> Result<&mut Self> {
        for column in columns {
            let value = match &self.strategy {
                ImputeStrategy::Mean => {
                    let observed = numeric_values(column)?;
                    let present: Vec<f64> = observed.into_iter().flatten().collect();
                    let mean = if present.is_empty() {
                        0.0
                    } else {
                        present.iter().sum::<f64>() / present.len() as f64
                    };
                    ImputeValue::Numeric(mean)
                }
                ImputeStrategy::ConstantString(fill) => ImputeValue::String(fill.clone()),
            };
            self.fill_values.insert(column.name().to_string(), value);
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Fill missing cells of a numeric column
    pub fn impute_numeric(&self, column: &Column) -> Result<Vec<f64>> {
        match self.fill_for(column)? {
            ImputeValue::Numeric(fill) => Ok(numeric_values(column)?
                .into_iter()
                .map(|v| v.unwrap_or(*fill))
                .collect()),
            ImputeValue::String(_) => Err(SelectError::Configuration(format!(
                "column '{}' was fitted with a text fill value",
                column.name()
            ))),
        }
    }

    /// Fill missing cells of a categorical column, returning category keys
    pub fn impute_categorical(&self, column: &Column) -> Result<Vec<String>> {
        let fill = match self.fill_for(column)? {
            ImputeValue::String(fill) => fill.clone(),
            ImputeValue::Numeric(v) => v.to_string(),
        };
        Ok(column
            .values()
            .iter()
            .map(|v| v.category_key().unwrap_or_else(|| fill.clone()))
            .collect())
    }

    fn fill_for(&self, column: &Column) -> Result<&ImputeValue> {
        if !self.is_fitted {
            return Err(SelectError::NotFitted("imputer".to_string()));
        }
        self.fill_values.get(column.name()).ok_or_else(|| {
            SelectError::Data(format!("imputer was not fitted on column '{}'", column.name()))
        })
    }
}

/// Numeric view of a column; text in a numeric column is a data error
fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    column
        .values()
        .iter()
        .map(|v| match v {
            v if v.is_missing() => Ok(None),
            Scalar::Number(x) => Ok(Some(*x)),
            other => Err(SelectError::Data(format!(
                "column '{}' is numerical but contains {:?}",
                column.name(),
                other
            ))),
        })
        .collect()
}
