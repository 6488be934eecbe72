//! Column-oriented tabular data
//!
//! A [`Dataset`] is an ordered list of named columns whose cells are
//! [`Scalar`] values. Datasets are never mutated in place: every
//! selection or split returns a new dataset.

use crate::error::{Result, SelectError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// One cell of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Scalar {
    /// Missing marker or a NaN number
    pub fn is_missing(&self) -> bool {
        match self {
            Scalar::Missing => true,
            Scalar::Number(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Stable string form used for category vocabularies and feature names.
    /// Integral numbers render without a fractional part.
    pub fn category_key(&self) -> Option<String> {
        match self {
            Scalar::Missing => None,
            Scalar::Number(v) if v.is_nan() => None,
            Scalar::Number(v) => Some(format_number(*v)),
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Text(s) => Some(s.clone()),
        }
    }

    /// Total order used for vocabularies and label classes:
    /// numbers ascending, then booleans, then text, then missing.
    pub fn total_cmp(&self, other: &Scalar) -> Ordering {
        fn rank(s: &Scalar) -> u8 {
            match s {
                Scalar::Number(v) if !v.is_nan() => 0,
                Scalar::Bool(_) => 1,
                Scalar::Text(_) => 2,
                _ => 3,
            }
        }
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) if !a.is_nan() && !b.is_nan() => a.total_cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Number(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(v as f64)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Missing)
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// What kind of values a column actually holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    Boolean,
    Text,
    /// More than one non-missing kind
    Mixed,
    /// Every value missing
    Empty,
}

/// A named column of scalars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Numeric column from optional values
    pub fn numeric(name: impl Into<String>, values: &[Option<f64>]) -> Self {
        Self::new(name, values.iter().map(|v| Scalar::from(*v)).collect())
    }

    /// Text column from optional values
    pub fn text(name: impl Into<String>, values: &[Option<&str>]) -> Self {
        Self::new(name, values.iter().map(|v| Scalar::from(*v)).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    pub fn observed_kind(&self) -> ValueKind {
        let mut kind: Option<ValueKind> = None;
        for value in &self.values {
            let this = match value {
                v if v.is_missing() => continue,
                Scalar::Number(_) => ValueKind::Numeric,
                Scalar::Bool(_) => ValueKind::Boolean,
                Scalar::Text(_) => ValueKind::Text,
                Scalar::Missing => continue,
            };
            match kind {
                None => kind = Some(this),
                Some(k) if k != this => return ValueKind::Mixed,
                _ => {}
            }
        }
        kind.unwrap_or(ValueKind::Empty)
    }

    /// Distinct non-missing values in vocabulary order
    pub fn distinct(&self) -> Vec<Scalar> {
        let mut seen = HashSet::new();
        let mut out: Vec<Scalar> = Vec::new();
        for value in &self.values {
            if let Some(key) = value.category_key() {
                if seen.insert(key) {
                    out.push(value.clone());
                }
            }
        }
        out.sort_by(|a, b| a.total_cmp(b));
        out
    }

    fn select(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            values: rows.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

/// One row keyed by column name
pub type Record = BTreeMap<String, Scalar>;

/// Ordered, immutable collection of equally long named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, checking that names are unique and row counts agree
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut names = HashSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(SelectError::Data(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name, column.len(), n_rows
                )));
            }
            if !names.insert(column.name.as_str()) {
                return Err(SelectError::Data(format!("duplicate column '{}'", column.name)));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Build from row records. Columns appear in first-seen order; a key
    /// absent from a record becomes a missing value.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).cloned().unwrap_or(Scalar::Missing))
                    .collect();
                Column::new(name, values)
            })
            .collect();
        Self::new(columns)
    }

    /// Parse a JSON array of row objects
    pub fn from_json_records(json: &str) -> Result<Self> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Self::from_records(&records)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with a data error when absent
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| SelectError::Data(format!("column '{}' not found", name)))
    }

    /// Separate the named target column from the features
    pub fn split_target(&self, target: &str) -> Result<(Dataset, Column)> {
        let y = self.require(target)?.clone();
        let features = self
            .columns
            .iter()
            .filter(|c| c.name != target)
            .cloned()
            .collect();
        Ok((Dataset { columns: features, n_rows: self.n_rows }, y))
    }

    /// Rows at the given indices, in that order
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    /// SHA-256 over the canonical JSON form of the data
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.columns)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("age", &[Some(31.0), None, Some(45.0)]),
            Column::text("city", &[Some("Oslo"), Some("Lima"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Dataset::new(vec![
            Column::numeric("a", &[Some(1.0), Some(2.0)]),
            Column::numeric("b", &[Some(1.0)]),
        ]);
        assert!(matches!(result, Err(SelectError::Data(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Dataset::new(vec![
            Column::numeric("a", &[Some(1.0)]),
            Column::numeric("a", &[Some(2.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_records_fill_missing_keys() {
        let json = r#"[{"x": 1, "c": "a"}, {"x": 2.5}, {"c": null, "x": null}]"#;
        let ds = Dataset::from_json_records(json).unwrap();
        assert_eq!(ds.n_rows(), 3);
        let c = ds.column("c").unwrap();
        assert_eq!(c.values()[0], Scalar::Text("a".into()));
        assert!(c.values()[1].is_missing());
        assert!(c.values()[2].is_missing());
        assert_eq!(ds.column("x").unwrap().values()[1], Scalar::Number(2.5));
    }

    #[test]
    fn test_split_target() {
        let (x, y) = sample().split_target("city").unwrap();
        assert_eq!(x.column_names(), vec!["age"]);
        assert_eq!(y.name(), "city");
        assert!(sample().split_target("nope").is_err());
    }

    #[test]
    fn test_observed_kind() {
        let ds = sample();
        assert_eq!(ds.column("age").unwrap().observed_kind(), ValueKind::Numeric);
        assert_eq!(ds.column("city").unwrap().observed_kind(), ValueKind::Text);
        let mixed = Column::new("m", vec![Scalar::from(1.0), Scalar::from("a")]);
        assert_eq!(mixed.observed_kind(), ValueKind::Mixed);
        let empty = Column::new("e", vec![Scalar::Missing, Scalar::Number(f64::NAN)]);
        assert_eq!(empty.observed_kind(), ValueKind::Empty);
    }

    #[test]
    fn test_distinct_ordering() {
        let col = Column::new(
            "v",
            vec![
                Scalar::from("b"),
                Scalar::from(10.0),
                Scalar::from(2.0),
                Scalar::from("a"),
                Scalar::from(2.0),
                Scalar::Missing,
            ],
        );
        let keys: Vec<String> = col.distinct().iter().filter_map(|v| v.category_key()).collect();
        assert_eq!(keys, vec!["2", "10", "a", "b"]);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = sample().fingerprint().unwrap();
        let b = sample().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let other = sample().select_rows(&[0, 1]).fingerprint().unwrap();
        assert_ne!(a, other);
    }
}
