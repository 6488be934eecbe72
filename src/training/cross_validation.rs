//! Cross-validation splitters

use crate::error::{Result, SelectError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Plain K-Fold
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (keeps class proportions per fold)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold {
            n_splits: 5,
            shuffle: true,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits. The fold count is capped at `n_samples`.
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let requested = self.strategy.n_splits();
        if requested < 2 {
            return Err(SelectError::Configuration(format!(
                "n_splits must be at least 2, got {}",
                requested
            )));
        }
        if n_samples < 2 {
            return Err(SelectError::Data(format!(
                "cross-validation needs at least 2 rows, got {}",
                n_samples
            )));
        }
        let n_splits = requested.min(n_samples);

        let folds = match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| {
                    SelectError::Configuration("StratifiedKFold requires a target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(SelectError::Shape {
                        expected: format!("target length = {}", n_samples),
                        actual: format!("target length = {}", y.len()),
                    });
                }
                self.stratified_k_fold(y, n_splits, shuffle)
            }
        };

        Ok(Self::assemble(folds))
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }
        folds
    }

    fn stratified_k_fold(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = self.rng();
        if shuffle {
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin continues across classes so fold sizes stay balanced
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }
        folds
    }

    fn assemble(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect()
    }
}
