//! Bayesian hyperparameter search with cross-validated trials

use super::{
    config::{OptimizeDirection, SearchConfig},
    samplers::create_sampler,
    search_space::{SearchSpace, TrialParams},
    study::{HistoryRecord, Study, TrialOutcome},
};
use crate::error::{Result, SelectError};
use crate::training::cross_validation::{CVSplit, CVStrategy, CrossValidator};
use crate::training::models::{check_xy, Estimator, Model, Scoring};
use crate::training::TaskType;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Builds an unfitted model from one sampled assignment
pub type Constructor = fn(&TrialParams) -> Result<Estimator>;

/// Lifecycle of one search engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Created,
    Searching,
    Completed,
    /// Every trial failed; history is kept but there is no best model
    CompletedEmpty,
}

/// Output of a successful search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: TrialParams,
    pub best_score: f64,
    /// Best configuration refit on the full data
    pub best_model: Estimator,
    pub history: Vec<HistoryRecord>,
}

/// Sequential model-based search over one family's hyperparameters.
///
/// Each trial samples an assignment, scores it by k-fold cross-validation
/// and feeds the score back to the sampler. A trial that errors is kept in
/// the study with the worst possible score instead of aborting the search.
pub struct BayesianSearch {
    search_space: SearchSpace,
    constructor: Constructor,
    task: TaskType,
    config: SearchConfig,
    study: Option<Study>,
    state: SearchState,
}

impl BayesianSearch {
    pub fn new(search_space: SearchSpace, constructor: Constructor, task: TaskType, config: SearchConfig) -> Self {
        Self {
            search_space,
            constructor,
            task,
            config,
            study: None,
            state: SearchState::Created,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Study of the last completed run
    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run `n_trials` trials, then refit the best assignment on all of `x`
    pub fn optimize(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        self.config.validate()?;
        self.search_space.validate()?;
        if self.config.direction != OptimizeDirection::Maximize {
            return Err(SelectError::Configuration(
                "search scores are higher-is-better; direction must be Maximize".to_string(),
            ));
        }
        check_xy(x, y)?;

        let splits = self.splits(x.nrows(), y)?;
        let scoring = Scoring::for_task(self.task);
        let mut sampler = create_sampler(self.config.sampler, &self.config.tpe, self.config.random_state);
        let mut study = Study::new(self.config.direction);

        self.state = SearchState::Searching;
        let start = Instant::now();

        for trial in 0..self.config.n_trials {
            let trial_start = Instant::now();
            let params = sampler.sample(&self.search_space, &study.sampler_history());

            let outcome = match self.cross_validate(&params, x, y, &splits, scoring) {
                Ok(score) if score.is_finite() => TrialOutcome::Scored(score),
                Ok(score) => TrialOutcome::Failed(format!("non-finite cross-validation score {}", score)),
                Err(e) => TrialOutcome::Failed(e.to_string()),
            };
            if let TrialOutcome::Failed(reason) = &outcome {
                warn!(trial, error = %reason, "trial failed");
            }

            let score = study.add_trial(params, outcome, trial_start.elapsed().as_secs_f64()).value;
            debug!(trial, score, best = ?study.best_value(), "trial finished");
        }
        study.total_duration_secs = start.elapsed().as_secs_f64();

        let best = study.best_trial().map(|t| (t.params.clone(), t.value));
        let n_trials = study.n_trials();
        self.study = Some(study);

        let Some((best_params, best_score)) = best else {
            self.state = SearchState::CompletedEmpty;
            return Err(SelectError::Training(format!("all {} trials failed", n_trials)));
        };
        self.state = SearchState::Completed;

        let mut best_model = (self.constructor)(&best_params)
            .map_err(|e| SelectError::Training(format!("failed to build best model: {}", e)))?;
        best_model
            .fit(x, y)
            .map_err(|e| SelectError::Training(format!("refit on full data failed: {}", e)))?;

        Ok(SearchResult {
            best_params,
            best_score,
            best_model,
            history: self.get_optimization_history()?,
        })
    }

    /// Every trial of the last run in order, failed ones included
    pub fn get_optimization_history(&self) -> Result<Vec<HistoryRecord>> {
        self.study
            .as_ref()
            .map(Study::history)
            .ok_or_else(|| SelectError::NotRun("no optimize() call has completed".to_string()))
    }

    fn splits(&self, n_samples: usize, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.config.cv_folds;
        let (strategy, stratify) = match self.task {
            TaskType::Classification => (CVStrategy::StratifiedKFold { n_splits, shuffle: true }, Some(y)),
            TaskType::Regression => (CVStrategy::KFold { n_splits, shuffle: true }, None),
        };
        let mut cv = CrossValidator::new(strategy);
        if let Some(seed) = self.config.random_state {
            cv = cv.with_random_state(seed);
        }
        cv.split(n_samples, stratify)
    }

    fn cross_validate(
        &self,
        params: &TrialParams,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
        scoring: Scoring,
    ) -> Result<f64> {
        let evaluate = |split: &CVSplit| -> Result<f64> {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = (self.constructor)(params)?;
            model.fit(&x_train, &y_train)?;
            let predictions = model.predict(&x_test)?;
            Ok(scoring.score(&y_test, &predictions))
        };

        let scores: Vec<f64> = if self.config.parallel_folds {
            splits.par_iter().map(evaluate).collect::<Result<_>>()?
        } else {
            splits.iter().map(evaluate).collect::<Result<_>>()?
        };
        Ok(scores.iter().sum::<f64>() / scores.len().max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::knn::{KNNConfig, KNN};
    use crate::training::linear_models::LinearRegression;
    use crate::training::registry::{candidate, ModelFamily};
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn knn_with_k(params: &TrialParams) -> Result<Estimator> {
        let k = params.get("k").and_then(|v| v.as_int()).unwrap_or(1) as usize;
        Ok(Estimator::KNN(KNN::classifier(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })))
    }

    fn always_fails(_: &TrialParams) -> Result<Estimator> {
        Err(SelectError::invalid_param("alpha", -1, "must be positive"))
    }

    fn linear(_: &TrialParams) -> Result<Estimator> {
        Ok(Estimator::LinearRegression(LinearRegression::new()))
    }

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    // Succeeds for 3 trials of 3 folds, then fails the full-data build
    fn fails_after_cv(_: &TrialParams) -> Result<Estimator> {
        if BUILDS.fetch_add(1, Ordering::SeqCst) >= 9 {
            return Err(SelectError::invalid_param("fit_intercept", "refit", "unavailable"));
        }
        Ok(Estimator::LinearRegression(LinearRegression::new()))
    }

    fn two_blobs() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| {
            let base = if i < 10 { 0.0 } else { 5.0 };
            base + (i % 10) as f64 * 0.1 + j as f64 * 0.05
        });
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 0.0 } else { 1.0 });
        (x, y)
    }

    fn small_config(n_trials: usize) -> SearchConfig {
        SearchConfig::new()
            .with_n_trials(n_trials)
            .with_cv_folds(3)
            .with_n_startup_trials(3)
            .with_random_state(7)
    }

    #[test]
    fn test_history_before_run() {
        let search = BayesianSearch::new(SearchSpace::new(), linear, TaskType::Regression, SearchConfig::default());
        assert_eq!(search.state(), SearchState::Created);
        assert!(matches!(search.get_optimization_history(), Err(SelectError::NotRun(_))));
    }

    #[test]
    fn test_failed_trials_get_sentinel_score() {
        // k above the 13 or 14 training rows of a fold makes the fit fail
        let space = SearchSpace::new().int("k", 1, 30);
        let (x, y) = two_blobs();
        let mut search = BayesianSearch::new(space, knn_with_k, TaskType::Classification, small_config(12));
        let result = search.optimize(&x, &y).unwrap();

        let history = search.get_optimization_history().unwrap();
        assert_eq!(history.len(), 12);
        assert_eq!(result.history, history);
        for record in &history {
            let k = record.params["k"].as_int().unwrap();
            if k > 13 {
                assert_eq!(record.score, f64::NEG_INFINITY);
            } else {
                assert!(record.score.is_finite());
            }
        }
        assert!(result.best_score.is_finite());
        assert!(result.best_model.is_fitted());
        assert_eq!(search.state(), SearchState::Completed);
    }

    #[test]
    fn test_all_trials_failing_is_a_training_error() {
        let (x, y) = two_blobs();
        let mut search = BayesianSearch::new(SearchSpace::new(), always_fails, TaskType::Classification, small_config(4));
        let result = search.optimize(&x, &y);
        assert!(matches!(result, Err(SelectError::Training(_))));
        assert_eq!(search.state(), SearchState::CompletedEmpty);

        let history = search.get_optimization_history().unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|h| h.score == f64::NEG_INFINITY));
    }

    #[test]
    fn test_empty_space_regression() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        let mut search = BayesianSearch::new(SearchSpace::new(), linear, TaskType::Regression, small_config(3));
        let result = search.optimize(&x, &y).unwrap();
        assert!(result.best_params.is_empty());
        assert!(result.best_score > -1e-9);
        assert_eq!(result.history.len(), 3);
    }

    #[test]
    fn test_registry_family_search() {
        let (x, y) = two_blobs();
        let entry = candidate(TaskType::Classification, ModelFamily::LogisticRegression).unwrap();
        let mut search = BayesianSearch::new(
            entry.search_space,
            entry.constructor,
            TaskType::Classification,
            small_config(4).with_parallel_folds(false),
        );
        let result = search.optimize(&x, &y).unwrap();
        assert!(result.best_score > 0.9);
        assert!(result.best_params.contains_key("C"));
        assert!(result.best_params.contains_key("max_iter"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut search = BayesianSearch::new(
            SearchSpace::new(),
            linear,
            TaskType::Regression,
            SearchConfig::new().with_cv_folds(1),
        );
        let result = search.optimize(&array![[1.0], [2.0]], &array![1.0, 2.0]);
        assert!(matches!(result, Err(SelectError::Configuration(_))));
        assert_eq!(search.state(), SearchState::Created);
    }

    #[test]
    fn test_refit_failure_after_successful_trials() {
        BUILDS.store(0, Ordering::SeqCst);
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        let mut search = BayesianSearch::new(SearchSpace::new(), fails_after_cv, TaskType::Regression, small_config(3));
        let result = search.optimize(&x, &y);

        match result {
            Err(SelectError::Training(msg)) => assert!(msg.contains("best model"), "{}", msg),
            other => panic!("expected a training error, got {:?}", other.map(|r| r.best_score)),
        }
        let history = search.get_optimization_history().unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|h| h.score.is_finite()));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_minimize_direction_rejected() {
        let mut config = small_config(2);
        config.direction = OptimizeDirection::Minimize;
        let mut search = BayesianSearch::new(SearchSpace::new(), linear, TaskType::Regression, config);
        let result = search.optimize(&array![[1.0], [2.0], [3.0]], &array![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(SelectError::Configuration(_))));
        assert_eq!(search.state(), SearchState::Created);
    }
}
