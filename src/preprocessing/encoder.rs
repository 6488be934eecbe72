//! Categorical encoding: one-hot features and label encoding of targets

use crate::dataset::{Column, Scalar};
use crate::error::{Result, SelectError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Fitted vocabulary of one categorical column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Vocabulary {
    categories: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    fn from_keys(categories: Vec<String>) -> Self {
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self { categories, index }
    }
}

/// One-hot encoder. Categories unseen during fit encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocabularies: HashMap<String, Vocabulary>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            vocabularies: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the vocabulary of a column from its imputed category keys.
    /// `original` supplies the ordering of the observed values.
    pub fn fit_column(&mut self, original: &Column, imputed: &[String]) -> &mut Self {
        let mut categories: Vec<String> = original
            .distinct()
            .iter()
            .filter_map(Scalar::category_key)
            .collect();
        // The fill label sorts after every observed value
        let observed: HashSet<&str> = categories.iter().map(String::as_str).collect();
        let fills: BTreeSet<&str> = imputed
            .iter()
            .map(String::as_str)
            .filter(|k| !observed.contains(k))
            .collect();
        let fills: Vec<String> = fills.into_iter().map(str::to_string).collect();
        categories.extend(fills);

        self.vocabularies
            .insert(original.name().to_string(), Vocabulary::from_keys(categories));
        self.is_fitted = true;
        self
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.vocabularies.get(column).map(|v| v.categories.as_slice())
    }

    /// Width of the indicator block for a column
    pub fn width(&self, column: &str) -> usize {
        self.vocabularies.get(column).map(|v| v.categories.len()).unwrap_or(0)
    }

    /// Indicator position of each row, `None` for unseen categories
    pub fn positions(&self, column: &str, keys: &[String]) -> Result<Vec<Option<usize>>> {
        if !self.is_fitted {
            return Err(SelectError::NotFitted("one-hot encoder".to_string()));
        }
        let vocab = self.vocabularies.get(column).ok_or_else(|| {
            SelectError::Data(format!("encoder was not fitted on column '{}'", column))
        })?;
        Ok(keys.iter().map(|k| vocab.index.get(k).copied()).collect())
    }
}

/// Bijection between original target labels and `0..n_classes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoding {
    classes: Vec<Scalar>,
    index: HashMap<String, usize>,
}

impl LabelEncoding {
    /// Build from the non-missing values of a target column, classes sorted
    pub fn fit(target: &Column) -> Result<Self> {
        let classes = target.distinct();
        if classes.is_empty() {
            return Err(SelectError::DataQuality(format!(
                "target '{}' has no non-missing labels",
                target.name()
            )));
        }
        let index = classes
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.category_key().map(|k| (k, i)))
            .collect();
        Ok(Self { classes, index })
    }

    pub fn classes(&self) -> &[Scalar] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, labels: &[Scalar]) -> Result<Array1<f64>> {
        labels
            .iter()
            .map(|label| {
                label
                    .category_key()
                    .and_then(|k| self.index.get(&k))
                    .map(|&i| i as f64)
                    .ok_or_else(|| SelectError::Data(format!("label {:?} was not seen during fit", label)))
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    pub fn decode(&self, encoded: &[f64]) -> Result<Vec<Scalar>> {
        encoded
            .iter()
            .map(|&v| {
                let idx = v.round();
                if idx < 0.0 || idx as usize >= self.classes.len() {
                    return Err(SelectError::Data(format!("encoded label {} is out of range", v)));
                }
                Ok(self.classes[idx as usize].clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_positions() {
        let col = Column::text("color", &[Some("red"), Some("blue"), None]);
        let imputed = vec!["red".to_string(), "blue".to_string(), "missing".to_string()];
        let mut enc = OneHotEncoder::new();
        enc.fit_column(&col, &imputed);

        assert_eq!(enc.categories("color").unwrap(), &["blue", "red", "missing"]);
        let pos = enc
            .positions("color", &["red".to_string(), "green".to_string()])
            .unwrap();
        assert_eq!(pos, vec![Some(1), None]);
    }

    #[test]
    fn test_high_cardinality_vocabulary() {
        let names: Vec<String> = (0..5000).map(|i| format!("id{:05}", i)).collect();
        let mut values: Vec<Option<&str>> = names.iter().map(|n| Some(n.as_str())).collect();
        values.push(None);
        values.push(None);
        let col = Column::text("user", &values);
        let mut imputed = names.clone();
        imputed.push("missing".to_string());
        imputed.push("missing".to_string());

        let mut enc = OneHotEncoder::new();
        enc.fit_column(&col, &imputed);
        let categories = enc.categories("user").unwrap();
        assert_eq!(categories.len(), 5001);
        assert_eq!(categories[0], "id00000");
        assert_eq!(categories[4999], "id04999");
        assert_eq!(categories[5000], "missing");
        let pos = enc.positions("user", &["id02500".to_string()]).unwrap();
        assert_eq!(pos, vec![Some(2500)]);
    }

    #[test]
    fn test_label_encoding_sorted() {
        let target = Column::text("y", &[Some("dog"), Some("cat"), Some("dog"), None]);
        let enc = LabelEncoding::fit(&target).unwrap();
        assert_eq!(enc.classes(), &[Scalar::from("cat"), Scalar::from("dog")]);
        let encoded = enc.encode(&target.values()[..3]).unwrap();
        assert_eq!(encoded.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_label_round_trip_numeric() {
        let target = Column::numeric("y", &[Some(3.0), Some(1.0), Some(2.0)]);
        let enc = LabelEncoding::fit(&target).unwrap();
        let encoded = enc.encode(target.values()).unwrap();
        let decoded = enc.decode(encoded.as_slice().unwrap()).unwrap();
        assert_eq!(decoded, target.values());
    }

    #[test]
    fn test_unknown_label_rejected() {
        let target = Column::text("y", &[Some("a"), Some("b")]);
        let enc = LabelEncoding::fit(&target).unwrap();
        assert!(enc.encode(&[Scalar::from("c")]).is_err());
        assert!(enc.decode(&[5.0]).is_err());
    }
}
