//! XGBoost-style gradient boosting: depth-wise trees with exact greedy
//! splits, L2-regularized leaf weights and a minimum split gain (gamma).

use super::boosting::{find_best_split, leaf_for, partition, BoostNode, BoostedTrees, SplitParams, TreeGrower};
use super::models::Model;
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    /// Row fraction drawn per tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    fn split_params(&self) -> SplitParams {
        SplitParams {
            reg_lambda: self.reg_lambda,
            min_child_weight: self.min_child_weight,
            min_samples_leaf: 1,
        }
    }

    fn grow_node(
        &self,
        x: &Array2<f64>,
        grad: &Array1<f64>,
        hess: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        depth: usize,
    ) -> BoostNode {
        let leaf = || BoostNode::Leaf {
            weight: leaf_for(grad, hess, indices, self.reg_lambda),
        };
        if depth >= self.max_depth || indices.len() < 2 {
            return leaf();
        }

        match find_best_split(x, grad, hess, indices, features, self.split_params()) {
            Some(split) if split.gain > self.gamma => {
                let (left_idx, right_idx) = partition(x, indices, &split);
                if left_idx.is_empty() || right_idx.is_empty() {
                    return leaf();
                }
                BoostNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.grow_node(x, grad, hess, &left_idx, features, depth + 1)),
                    right: Box::new(self.grow_node(x, grad, hess, &right_idx, features, depth + 1)),
                }
            }
            _ => leaf(),
        }
    }
}

impl TreeGrower for XGBoostConfig {
    fn grow(&self, x: &Array2<f64>, grad: &Array1<f64>, hess: &Array1<f64>, stream: u64) -> BoostNode {
        let n = x.nrows();
        let rows: Vec<usize> = if self.subsample < 1.0 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state.wrapping_add(stream));
            let amount = ((n as f64 * self.subsample).ceil() as usize).clamp(1, n);
            let mut rows = sample(&mut rng, n, amount).into_vec();
            rows.sort_unstable();
            rows
        } else {
            (0..n).collect()
        };
        let features: Vec<usize> = (0..x.ncols()).collect();
        self.grow_node(x, grad, hess, &rows, &features, 0)
    }
}

/// XGBoost-style booster for both tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoost {
    pub config: XGBoostConfig,
    is_classification: bool,
    ensemble: Option<BoostedTrees>,
}

impl XGBoost {
    pub fn classifier(config: XGBoostConfig) -> Self {
        Self {
            config,
            is_classification: true,
            ensemble: None,
        }
    }

    pub fn regressor(config: XGBoostConfig) -> Self {
        Self {
            config,
            is_classification: false,
            ensemble: None,
        }
    }
}

impl Model for XGBoost {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.config.max_depth == 0 {
            return Err(SelectError::invalid_param("max_depth", 0, "must be at least 1"));
        }
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(SelectError::invalid_param("subsample", self.config.subsample, "must lie in (0, 1]"));
        }
        self.ensemble = Some(BoostedTrees::fit(
            x,
            y,
            self.is_classification,
            self.config.n_estimators,
            self.config.learning_rate,
            &self.config,
        )?);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensemble
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("XGBoost".to_string()))?
            .predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.ensemble.is_some()
    }
}
