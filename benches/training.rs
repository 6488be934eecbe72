use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_select::export::{BundleStore, MemoryBundleStore};
use kolosal_select::inference::InferenceService;
use kolosal_select::optimizer::{BayesianSearch, SearchConfig};
use kolosal_select::training::{candidate, ModelFamily, TaskType, TrainingConfig, TrainingOrchestrator};
use kolosal_select::utils::dataframe_to_dataset;
use kolosal_select::dataset::Dataset;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

fn create_regression_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target as sum of features + noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Column::new(format!("feature_{}", i).into(), values))
        .collect();
    let regions: Vec<&str> = (0..n_rows).map(|i| ["north", "south", "west"][i % 3]).collect();
    columns.push(Column::new("region".into(), regions));
    columns.push(Column::new("target".into(), target));

    dataframe_to_dataset(&DataFrame::new(columns).unwrap()).unwrap()
}

fn bench_family_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let x = Array2::from_shape_fn((500, 8), |_| rng.gen::<f64>());
    let y = Array1::from_shape_fn(500, |i| x.row(i).sum());

    for family in [ModelFamily::LinearRegression, ModelFamily::Svr, ModelFamily::LightGbm] {
        let entry = candidate(TaskType::Regression, family).unwrap();
        group.bench_with_input(BenchmarkId::new("optimize", family), &entry, |b, entry| {
            b.iter(|| {
                let config = SearchConfig::new().with_n_trials(5).with_random_state(1);
                let mut search = BayesianSearch::new(
                    entry.search_space.clone(),
                    entry.constructor,
                    TaskType::Regression,
                    config,
                );
                search.optimize(black_box(&x), black_box(&y)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [200, 1000].iter() {
        let data = create_regression_data(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("train", n_rows), &data, |b, data| {
            b.iter(|| {
                let config = TrainingConfig::new(TaskType::Regression, "target")
                    .with_n_trials(3)
                    .with_cv_folds(3)
                    .with_parallel_families(true);
                TrainingOrchestrator::new(config, Arc::new(MemoryBundleStore::new()))
                    .train(black_box(data))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train once
    let store: Arc<dyn BundleStore> = Arc::new(MemoryBundleStore::new());
    let config = TrainingConfig::new(TaskType::Regression, "target")
        .with_n_trials(3)
        .with_families(vec![ModelFamily::RandomForest]);
    TrainingOrchestrator::new(config, Arc::clone(&store))
        .train(&create_regression_data(1000, 6))
        .unwrap();
    let bundle = store.get(ModelFamily::RandomForest).unwrap();

    for n_rows in [100, 1000].iter() {
        let (rows, _) = create_regression_data(*n_rows, 6).split_target("target").unwrap();

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &rows, |b, rows| {
            b.iter(|| InferenceService::predict_with(&bundle, black_box(rows)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_family_search, bench_training, bench_prediction);
criterion_main!(benches);
