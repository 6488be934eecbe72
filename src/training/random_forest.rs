//! Random Forest implementation

use super::decision_tree::DecisionTree;
use super::models::{check_width, check_xy, class_count, Model};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    All,
}

/// Bagged ensemble of CART trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub random_state: u64,
    is_classification: bool,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    fn new(n_estimators: usize, is_classification: bool) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            max_features: if is_classification { MaxFeatures::Sqrt } else { MaxFeatures::All },
            random_state: 42,
            is_classification,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::new(n_estimators, true)
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::new(n_estimators, false)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn features_per_split(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().ceil() as usize).max(1),
            MaxFeatures::All => n_features,
        }
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.n_estimators == 0 {
            return Err(SelectError::invalid_param("n_estimators", 0, "must be at least 1"));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.n_classes = if self.is_classification { class_count(y)? } else { 0 };
        let max_features = self.features_per_split(self.n_features);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let base = if self.is_classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                let mut tree = base
                    .with_min_samples_split(self.min_samples_split)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                tree.fit_indices(x, y, &sample)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(SelectError::NotFitted("RandomForest".to_string()));
        }
        check_width(self.n_features, x)?;

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_rows = x.nrows();
        let predictions = (0..n_rows)
            .map(|row| {
                if self.is_classification {
                    let mut votes = vec![0usize; self.n_classes.max(1)];
                    for pred in &per_tree {
                        if let Some(v) = votes.get_mut(pred[row] as usize) {
                            *v += 1;
                        }
                    }
                    votes
                        .iter()
                        .enumerate()
                        .fold((0, 0), |(bc, bn), (c, &n)| if n > bn { (c, n) } else { (bc, bn) })
                        .0 as f64
                } else {
                    per_tree.iter().map(|p| p[row]).sum::<f64>() / per_tree.len() as f64
                }
            })
            .collect();
        Ok(predictions)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
