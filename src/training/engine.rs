//! Training orchestrator
//!
//! Runs the data-quality gates, fits one transformation pipeline, searches
//! every candidate family on the transformed data and persists a bundle
//! per successful family.

use super::config::{TaskType, TrainingConfig};
use super::models::{Model, ModelMetrics};
use super::registry::{catalog, Candidate, ModelFamily};
use crate::dataset::{Column, Dataset, Scalar};
use crate::error::{Result, SelectError};
use crate::export::{BundleStore, TrainedBundle};
use crate::optimizer::{BayesianSearch, HistoryRecord, TrialParams};
use crate::preprocessing::{classify_features, FeatureSpec, TransformPipeline};
use chrono::Utc;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of one family's search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyResult {
    pub family: ModelFamily,
    pub best_params: TrialParams,
    /// Mean cross-validated score of the best trial
    pub best_score: f64,
    pub history: Vec<HistoryRecord>,
    /// Metrics of the refit model on the full training data
    pub train_metrics: ModelMetrics,
    pub duration_secs: f64,
}

/// Aggregated result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub task: TaskType,
    pub results: BTreeMap<ModelFamily, FamilyResult>,
    /// Original class labels in encoding order (classification only)
    pub class_labels: Option<Vec<Scalar>>,
    /// Families that were skipped, with the reason
    pub failures: Vec<(ModelFamily, String)>,
    pub features: FeatureSpec,
    pub feature_names: Vec<String>,
    pub n_rows: usize,
    /// Rows dropped because their target was missing
    pub n_rows_dropped: usize,
}

impl TrainingReport {
    /// Family with the highest cross-validated score
    pub fn best(&self) -> Option<&FamilyResult> {
        self.results
            .values()
            .max_by(|a, b| a.best_score.total_cmp(&b.best_score))
    }
}

/// Drives one training run end to end
pub struct TrainingOrchestrator {
    config: TrainingConfig,
    store: Arc<dyn BundleStore>,
    candidates: Vec<Candidate>,
}

struct Prepared {
    pipeline: TransformPipeline,
    x: Array2<f64>,
    y: Array1<f64>,
    fingerprint: String,
}

impl TrainingOrchestrator {
    /// Orchestrator over the task's full catalog
    pub fn new(config: TrainingConfig, store: Arc<dyn BundleStore>) -> Self {
        let candidates = catalog(config.task);
        Self::with_candidates(config, store, candidates)
    }

    /// Orchestrator over an explicit candidate list, in that order
    pub fn with_candidates(config: TrainingConfig, store: Arc<dyn BundleStore>, candidates: Vec<Candidate>) -> Self {
        Self {
            config,
            store,
            candidates,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BundleStore> {
        &self.store
    }

    /// Train every candidate family on `data`.
    ///
    /// Fails only on a data-quality gate, invalid configuration, or when no
    /// family produced a model. Individual family failures are logged and
    /// listed in [`TrainingReport::failures`].
    pub fn train(&self, data: &Dataset) -> Result<TrainingReport> {
        self.config.validate()?;
        let task = self.config.task;
        let target = self.config.target_column.as_str();
        info!(task = %task, target, rows = data.n_rows(), columns = data.n_cols(), "training started");

        let observed: Vec<usize> = data
            .require(target)?
            .values()
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_missing())
            .map(|(i, _)| i)
            .collect();
        if observed.is_empty() {
            return Err(SelectError::DataQuality(format!(
                "target column '{}' is entirely missing",
                target
            )));
        }
        let n_dropped = data.n_rows() - observed.len();
        let data = if n_dropped > 0 {
            warn!(dropped = n_dropped, target, "dropping rows with a missing target");
            data.select_rows(&observed)
        } else {
            data.clone()
        };

        let (x, y) = data.split_target(target)?;
        if task == TaskType::Classification {
            check_class_balance(&y, self.config.min_class_ratio)?;
        }

        let features = classify_features(&x);
        let prepared = self.prepare(&data, &x, &y, &features)?;
        let class_labels = prepared.pipeline.label_classes().map(<[Scalar]>::to_vec);
        let feature_names = prepared.pipeline.get_feature_names().to_vec();

        let candidates: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| self.config.families.as_ref().map_or(true, |f| f.contains(&c.family)))
            .cloned()
            .collect();

        let outcomes: Vec<(ModelFamily, Result<FamilyResult>)> = if self.config.parallel_families {
            candidates
                .into_par_iter()
                .map(|c| (c.family, self.train_family(c, &prepared)))
                .collect()
        } else {
            candidates
                .into_iter()
                .map(|c| (c.family, self.train_family(c, &prepared)))
                .collect()
        };

        let mut results = BTreeMap::new();
        let mut failures = Vec::new();
        for (family, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    results.insert(family, result);
                }
                Err(e) => {
                    warn!(family = %family, error = %e, "family skipped");
                    failures.push((family, e.to_string()));
                }
            }
        }

        if results.is_empty() {
            error!(families = failures.len(), "every candidate family failed");
            return Err(SelectError::AllModelsFailed(
                failures.into_iter().map(|(f, e)| (f.to_string(), e)).collect(),
            ));
        }

        let report = TrainingReport {
            task,
            results,
            class_labels,
            failures,
            features,
            feature_names,
            n_rows: data.n_rows(),
            n_rows_dropped: n_dropped,
        };
        if let Some(best) = report.best() {
            info!(family = %best.family, score = best.best_score, trained = report.results.len(), "training finished");
        }
        Ok(report)
    }

    fn prepare(&self, data: &Dataset, x: &Dataset, y: &Column, features: &FeatureSpec) -> Result<Prepared> {
        let mut pipeline = TransformPipeline::new(self.config.preprocessing.clone());
        let (x, y) = match self.config.task {
            TaskType::Classification => {
                let transformed = pipeline.fit_transform(x, Some(y), features)?;
                let y = transformed
                    .y
                    .ok_or_else(|| SelectError::Data("label encoding produced no target".to_string()))?;
                (transformed.x, y)
            }
            TaskType::Regression => {
                let transformed = pipeline.fit_transform(x, None, features)?;
                (transformed.x, numeric_target(y)?)
            }
        };
        Ok(Prepared {
            pipeline,
            x,
            y,
            fingerprint: data.fingerprint()?,
        })
    }

    fn train_family(&self, candidate: Candidate, prepared: &Prepared) -> Result<FamilyResult> {
        let start = Instant::now();
        let family = candidate.family;
        let task = self.config.task;

        let mut search = BayesianSearch::new(
            candidate.search_space,
            candidate.constructor,
            task,
            self.config.search.clone(),
        );
        let result = search.optimize(&prepared.x, &prepared.y)?;
        let train_metrics = ModelMetrics::compute(task, &prepared.y, &result.best_model.predict(&prepared.x)?);

        let bundle = TrainedBundle {
            family,
            task,
            model: result.best_model,
            pipeline: prepared.pipeline.clone(),
            label_classes: prepared.pipeline.label_classes().map(<[Scalar]>::to_vec),
            feature_names: prepared.pipeline.get_feature_names().to_vec(),
            best_params: result.best_params.clone(),
            best_score: result.best_score,
            trained_at: Utc::now(),
            data_fingerprint: prepared.fingerprint.clone(),
        };
        self.store.put(&bundle)?;
        info!(family = %family, score = result.best_score, "bundle persisted");

        Ok(FamilyResult {
            family,
            best_params: result.best_params,
            best_score: result.best_score,
            history: result.history,
            train_metrics,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}

/// Gate a classification target: at least two classes, and the smallest
/// class no rarer than `min_ratio` times the largest.
pub fn check_class_balance(y: &Column, min_ratio: f64) -> Result<()> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in y.values().iter().filter_map(Scalar::category_key) {
        *counts.entry(key).or_default() += 1;
    }
    if counts.is_empty() {
        return Err(SelectError::DataQuality(format!(
            "target column '{}' is entirely missing",
            y.name()
        )));
    }
    if counts.len() < 2 {
        return Err(SelectError::DataQuality(format!(
            "target column '{}' has {} distinct class, at least 2 are required",
            y.name(),
            counts.len()
        )));
    }

    let smallest = counts.values().copied().min().unwrap_or(0);
    let largest = counts.values().copied().max().unwrap_or(1);
    let ratio = smallest as f64 / largest as f64;
    if ratio < min_ratio {
        return Err(SelectError::DataQuality(format!(
            "severe class imbalance: smallest/largest class ratio {:.3} is below {}",
            ratio, min_ratio
        )));
    }
    Ok(())
}

fn numeric_target(y: &Column) -> Result<Array1<f64>> {
    y.values()
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                SelectError::Data(format!(
                    "regression target '{}' must be numeric, found {:?}",
                    y.name(),
                    v
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemoryBundleStore;
    use crate::optimizer::{SearchConfig, SearchSpace};
    use crate::training::linear_models::LinearRegression;
    use crate::training::models::Estimator;
    use crate::training::registry::candidate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn labels(counts: &[(&str, usize)]) -> Column {
        let values: Vec<Option<&str>> = counts
            .iter()
            .flat_map(|(label, n)| std::iter::repeat(Some(*label)).take(*n))
            .collect();
        Column::text("y", &values)
    }

    fn fast_search() -> SearchConfig {
        SearchConfig::new()
            .with_n_trials(3)
            .with_cv_folds(3)
            .with_n_startup_trials(2)
            .with_random_state(3)
    }

    #[test]
    fn test_imbalance_gate() {
        assert!(matches!(
            check_class_balance(&labels(&[("a", 95), ("b", 5)]), 0.1),
            Err(SelectError::DataQuality(_))
        ));
        assert!(check_class_balance(&labels(&[("a", 60), ("b", 40)]), 0.1).is_ok());
    }

    #[test]
    fn test_class_count_gate() {
        assert!(matches!(
            check_class_balance(&labels(&[("a", 10)]), 0.1),
            Err(SelectError::DataQuality(_))
        ));
        assert!(check_class_balance(&labels(&[("a", 10), ("b", 10)]), 0.1).is_ok());
        let empty = Column::text("y", &[None, None]);
        assert!(matches!(check_class_balance(&empty, 0.1), Err(SelectError::DataQuality(_))));
    }

    #[test]
    fn test_missing_targets_are_dropped() {
        let n = 24;
        let x: Vec<Option<f64>> = (0..n).map(|i| Some(i as f64)).collect();
        let y: Vec<Option<f64>> = (0..n).map(|i| if i % 6 == 0 { None } else { Some(3.0 * i as f64) }).collect();
        let data = Dataset::new(vec![Column::numeric("x", &x), Column::numeric("y", &y)]).unwrap();

        let config = TrainingConfig::new(TaskType::Regression, "y")
            .with_search(fast_search())
            .with_families(vec![ModelFamily::LinearRegression]);
        let store = Arc::new(MemoryBundleStore::new());
        let report = TrainingOrchestrator::new(config, store.clone()).train(&data).unwrap();

        assert_eq!(report.n_rows_dropped, 4);
        assert_eq!(report.n_rows, 20);
        assert!(report.class_labels.is_none());
        assert!(store.contains(ModelFamily::LinearRegression));
        let result = &report.results[&ModelFamily::LinearRegression];
        assert_eq!(result.history.len(), 3);
        assert!(result.train_metrics.r2.unwrap() > 0.99);
    }

    #[test]
    fn test_entirely_missing_target() {
        let data = Dataset::new(vec![
            Column::numeric("x", &[Some(1.0), Some(2.0)]),
            Column::text("y", &[None, None]),
        ])
        .unwrap();
        let orchestrator = TrainingOrchestrator::new(
            TrainingConfig::new(TaskType::Classification, "y"),
            Arc::new(MemoryBundleStore::new()),
        );
        assert!(matches!(orchestrator.train(&data), Err(SelectError::DataQuality(_))));
    }

    #[test]
    fn test_classification_report_carries_labels() {
        let n = 30;
        let x: Vec<Option<f64>> = (0..n).map(|i| Some(if i < 15 { i as f64 * 0.1 } else { 10.0 + i as f64 * 0.1 })).collect();
        let y: Vec<Option<&str>> = (0..n).map(|i| Some(if i < 15 { "no" } else { "yes" })).collect();
        let data = Dataset::new(vec![Column::numeric("x", &x), Column::text("label", &y)]).unwrap();

        let config = TrainingConfig::new(TaskType::Classification, "label")
            .with_search(fast_search())
            .with_families(vec![ModelFamily::Knn, ModelFamily::LogisticRegression])
            .with_parallel_families(true);
        let report = TrainingOrchestrator::new(config, Arc::new(MemoryBundleStore::new()))
            .train(&data)
            .unwrap();

        assert_eq!(
            report.class_labels,
            Some(vec![Scalar::Text("no".to_string()), Scalar::Text("yes".to_string())])
        );
        assert_eq!(report.results.len(), 2);
        assert!(report.best().unwrap().best_score > 0.9);
    }

    static REFIT_BUILDS: AtomicUsize = AtomicUsize::new(0);

    // Builds for every cross-validation fold, then refuses the full-data refit
    fn fails_on_refit(_: &TrialParams) -> Result<Estimator> {
        if REFIT_BUILDS.fetch_add(1, Ordering::SeqCst) >= 9 {
            return Err(SelectError::invalid_param("solver", "refit", "unavailable"));
        }
        Ok(Estimator::LinearRegression(LinearRegression::new()))
    }

    #[test]
    fn test_refit_failure_skips_only_that_family() {
        let n = 30;
        let x: Vec<Option<f64>> = (0..n).map(|i| Some(i as f64)).collect();
        let y: Vec<Option<f64>> = (0..n).map(|i| Some(2.0 * i as f64 + 1.0)).collect();
        let data = Dataset::new(vec![Column::numeric("x", &x), Column::numeric("y", &y)]).unwrap();

        let broken = Candidate {
            family: ModelFamily::LinearRegression,
            constructor: fails_on_refit,
            search_space: SearchSpace::new(),
        };
        let working = candidate(TaskType::Regression, ModelFamily::Svr).unwrap();
        let config = TrainingConfig::new(TaskType::Regression, "y").with_search(fast_search());
        let store = Arc::new(MemoryBundleStore::new());
        let report = TrainingOrchestrator::with_candidates(config, store.clone(), vec![broken, working])
            .train(&data)
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, ModelFamily::LinearRegression);
        assert!(report.failures[0].1.contains("best model"), "{}", report.failures[0].1);
        assert!(report.results.contains_key(&ModelFamily::Svr));
        assert!(!report.results.contains_key(&ModelFamily::LinearRegression));
        assert!(!store.contains(ModelFamily::LinearRegression));
        assert!(store.contains(ModelFamily::Svr));
    }

    #[test]
    fn test_all_families_failing() {
        // Two-row training folds cannot hold 3 or more neighbours
        let data = Dataset::new(vec![
            Column::numeric("x", &[Some(0.0), Some(1.0), Some(2.0), Some(3.0)]),
            Column::text("y", &[Some("a"), Some("b"), Some("a"), Some("b")]),
        ])
        .unwrap();
        let mut search = fast_search().with_cv_folds(2);
        search.n_trials = 2;
        let config = TrainingConfig::new(TaskType::Classification, "y")
            .with_search(search)
            .with_families(vec![ModelFamily::Knn]);
        let result = TrainingOrchestrator::new(config, Arc::new(MemoryBundleStore::new())).train(&data);
        match result {
            Err(SelectError::AllModelsFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "knn");
            }
            other => panic!("expected AllModelsFailed, got {:?}", other.map(|r| r.results.len())),
        }
    }
}
