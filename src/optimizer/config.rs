//! Search configuration

use super::{SamplerType, TpeConfig};
use crate::error::{Result, SelectError};
use serde::{Deserialize, Serialize};

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Score recorded for a trial whose evaluation failed
    pub fn worst(self) -> f64 {
        match self {
            OptimizeDirection::Minimize => f64::INFINITY,
            OptimizeDirection::Maximize => f64::NEG_INFINITY,
        }
    }

    /// True when `a` is strictly better than `b`
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => a < b,
            OptimizeDirection::Maximize => a > b,
        }
    }

    /// Re-orient a score so that higher is better
    pub fn oriented(self, score: f64) -> f64 {
        match self {
            OptimizeDirection::Minimize => -score,
            OptimizeDirection::Maximize => score,
        }
    }
}

/// Configuration for one hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Optimization direction
    pub direction: OptimizeDirection,

    pub sampler: SamplerType,

    /// TPE settings, including the number of random startup trials
    pub tpe: TpeConfig,

    /// Cross-validation folds per trial
    pub cv_folds: usize,

    /// Seed for the sampler and the fold shuffle
    pub random_state: Option<u64>,

    /// Evaluate the folds of one trial in parallel
    pub parallel_folds: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_trials: 100,
            direction: OptimizeDirection::Maximize,
            sampler: SamplerType::TPE,
            tpe: TpeConfig::default(),
            cv_folds: 5,
            random_state: Some(42),
            parallel_folds: true,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.tpe.n_startup_trials = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(SelectError::Configuration("n_trials must be at least 1".to_string()));
        }
        if self.cv_folds < 2 {
            return Err(SelectError::Configuration(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.tpe.gamma > 0.0 && self.tpe.gamma < 1.0) {
            return Err(SelectError::Configuration(format!(
                "tpe.gamma must lie in (0, 1), got {}",
                self.tpe.gamma
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.n_trials, 100);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.tpe.n_startup_trials, 10);
        assert_eq!(config.random_state, Some(42));
        assert!(matches!(config.sampler, SamplerType::TPE));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SearchConfig::new()
            .with_n_trials(50)
            .with_sampler(SamplerType::Random)
            .with_cv_folds(3);

        assert_eq!(config.n_trials, 50);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.direction, OptimizeDirection::Maximize);
    }

    #[test]
    fn test_validation() {
        assert!(SearchConfig::new().with_n_trials(0).validate().is_err());
        assert!(SearchConfig::new().with_cv_folds(1).validate().is_err());
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(OptimizeDirection::Maximize.worst(), f64::NEG_INFINITY);
        assert_eq!(OptimizeDirection::Minimize.worst(), f64::INFINITY);
        assert!(OptimizeDirection::Minimize.is_better(1.0, 2.0));
        assert!(OptimizeDirection::Maximize.is_better(2.0, 1.0));
        assert_eq!(OptimizeDirection::Minimize.oriented(3.0), -3.0);
    }
}
