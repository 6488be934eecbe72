//! Property-based tests for the transformation pipeline and search history

use kolosal_select::dataset::{Column, Dataset, Scalar};
use kolosal_select::optimizer::{BayesianSearch, SearchConfig};
use kolosal_select::preprocessing::{classify_features, TransformPipeline};
use kolosal_select::training::{candidate, ModelFamily, TaskType};
use ndarray::{Array1, Array2};
use proptest::prelude::*;

const COLOURS: [&str; 4] = ["red", "green", "blue", "violet"];

fn table() -> impl Strategy<Value = (Vec<Option<f64>>, Vec<Option<usize>>)> {
    (3usize..30).prop_flat_map(|n| {
        (
            (-1e3f64..1e3, prop::collection::vec(prop::option::of(-1e3f64..1e3), n - 1)),
            prop::collection::vec(prop::option::weighted(0.8, 0usize..3), n),
        )
            .prop_map(|((first, rest), colours)| {
                let mut numbers = vec![Some(first)];
                numbers.extend(rest);
                (numbers, colours)
            })
    })
}

fn dataset(numbers: &[Option<f64>], colours: &[Option<usize>]) -> Dataset {
    let colours: Vec<Option<&str>> = colours.iter().map(|c| c.map(|i| COLOURS[i])).collect();
    Dataset::new(vec![Column::numeric("n", numbers), Column::text("c", &colours)]).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn transform_replays_fit_transform((numbers, colours) in table()) {
        let x = dataset(&numbers, &colours);
        let mut pipeline = TransformPipeline::default();
        let fitted = pipeline.fit_transform(&x, None, &classify_features(&x)).unwrap();
        let replayed = pipeline.transform(&x, None).unwrap();
        prop_assert_eq!(fitted.x, replayed.x.clone());
        prop_assert!(replayed.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn unseen_category_encodes_to_zeros((numbers, colours) in table()) {
        let x = dataset(&numbers, &colours);
        let mut pipeline = TransformPipeline::default();
        pipeline.fit_transform(&x, None, &classify_features(&x)).unwrap();

        // "violet" never appears during fitting
        let row = dataset(&[Some(0.0)], &[Some(3)]);
        let out = pipeline.transform(&row, None).unwrap();
        prop_assert_eq!(out.x.ncols(), pipeline.get_feature_names().len());
        prop_assert!(out.x.row(0).iter().skip(1).all(|&v| v == 0.0));
    }

    #[test]
    fn labels_round_trip(labels in prop::collection::vec(0usize..4, 2..40)) {
        let y = Column::text("y", &labels.iter().map(|&i| Some(COLOURS[i])).collect::<Vec<_>>());
        let x = Dataset::new(vec![Column::numeric("n", &vec![Some(1.0); labels.len()])]).unwrap();
        let mut pipeline = TransformPipeline::default();
        let out = pipeline.fit_transform(&x, Some(&y), &classify_features(&x)).unwrap();
        let decoded = pipeline.inverse_transform_target(&out.y.unwrap().to_vec()).unwrap();
        prop_assert_eq!(decoded, y.values().to_vec());

        let classes = pipeline.label_classes().unwrap();
        prop_assert!(classes.windows(2).all(|w| w[0].total_cmp(&w[1]).is_lt()));
        prop_assert!(classes.iter().all(|c| matches!(c, Scalar::Text(_))));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn history_covers_every_trial(n_trials in 1usize..6, seed in 0u64..1000) {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64 * 0.1);
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        let knn = candidate(TaskType::Classification, ModelFamily::Knn).unwrap();
        let config = SearchConfig::new()
            .with_n_trials(n_trials)
            .with_cv_folds(3)
            .with_n_startup_trials(2)
            .with_random_state(seed);
        let mut search = BayesianSearch::new(knn.search_space, knn.constructor, TaskType::Classification, config);
        let result = search.optimize(&x, &y).unwrap();

        let history = search.get_optimization_history().unwrap();
        prop_assert_eq!(history.len(), n_trials);
        prop_assert!(history.iter().all(|h| h.score.is_finite() || h.score == f64::NEG_INFINITY));
        prop_assert!(history.iter().all(|h| h.score <= result.best_score));
        prop_assert!(result.best_score.is_finite());
    }
}
