//! Training configuration

use super::registry::ModelFamily;
use crate::error::{Result, SelectError};
use crate::optimizer::SearchConfig;
use crate::preprocessing::PreprocessingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Type of ML task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = SelectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "classification" => Ok(TaskType::Classification),
            "regression" => Ok(TaskType::Regression),
            other => Err(SelectError::Configuration(format!(
                "unknown task type '{}', expected classification or regression",
                other
            ))),
        }
    }
}

/// Configuration for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Type of ML task
    pub task: TaskType,

    /// Target column name
    pub target_column: String,

    /// Search settings shared by every family
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub preprocessing: PreprocessingConfig,

    /// Smallest allowed ratio of minority to majority class count
    pub min_class_ratio: f64,

    /// Search families on separate rayon workers
    pub parallel_families: bool,

    /// Restrict the catalog to these families (None = all for the task)
    pub families: Option<Vec<ModelFamily>>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            task: TaskType::Regression,
            target_column: "target".to_string(),
            search: SearchConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            min_class_ratio: 0.1,
            parallel_families: false,
            families: None,
        }
    }
}

impl TrainingConfig {
    pub fn new(task: TaskType, target: impl Into<String>) -> Self {
        Self {
            task,
            target_column: target.into(),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.search.n_trials = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.search.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.search.random_state = Some(seed);
        self
    }

    pub fn with_min_class_ratio(mut self, ratio: f64) -> Self {
        self.min_class_ratio = ratio;
        self
    }

    pub fn with_parallel_families(mut self, parallel: bool) -> Self {
        self.parallel_families = parallel;
        self
    }

    pub fn with_families(mut self, families: Vec<ModelFamily>) -> Self {
        self.families = Some(families);
        self
    }

    /// Load a saved configuration
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if self.target_column.is_empty() {
            return Err(SelectError::Configuration("target column name is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_class_ratio) {
            return Err(SelectError::Configuration(format!(
                "min_class_ratio must lie in [0, 1], got {}",
                self.min_class_ratio
            )));
        }
        if let Some(families) = &self.families {
            if families.is_empty() {
                return Err(SelectError::Configuration(
                    "family list is empty; omit it to search the whole catalog".to_string(),
                ));
            }
            if let Some(bad) = families.iter().find(|f| !f.supports(self.task)) {
                return Err(SelectError::Configuration(format!(
                    "family '{}' does not support {}",
                    bad, self.task
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.min_class_ratio, 0.1);
        assert_eq!(config.search.cv_folds, 5);
        assert!(!config.parallel_families);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_task_type_parsing() {
        assert_eq!("Classification".parse::<TaskType>().unwrap(), TaskType::Classification);
        assert_eq!("regression".parse::<TaskType>().unwrap(), TaskType::Regression);
        assert!("clustering".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = TrainingConfig::new(TaskType::Classification, "label")
            .with_n_trials(7)
            .with_families(vec![ModelFamily::Knn]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        let loaded = TrainingConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.task, TaskType::Classification);
        assert_eq!(loaded.search.n_trials, 7);
        assert_eq!(loaded.families, Some(vec![ModelFamily::Knn]));
    }

    #[test]
    fn test_validation_rejects_bad_ratio_and_family() {
        let config = TrainingConfig::default().with_min_class_ratio(1.5);
        assert!(matches!(config.validate(), Err(SelectError::Configuration(_))));

        let config = TrainingConfig::new(TaskType::Regression, "y")
            .with_families(vec![ModelFamily::LogisticRegression]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_family_list_rejected() {
        let config = TrainingConfig::new(TaskType::Regression, "y").with_families(Vec::new());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SelectError::Configuration(_)));
        assert!(err.is_data_problem());
    }
}
