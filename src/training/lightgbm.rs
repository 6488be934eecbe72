//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Each tree repeatedly splits the leaf with the largest gain until it
//! reaches `num_leaves`, instead of growing level by level.

use super::boosting::{find_best_split, leaf_for, partition, BoostNode, BoostedTrees, SplitCandidate, SplitParams, TreeGrower};
use super::models::Model;
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    /// Fraction of features considered per tree
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

struct PendingSplit {
    split: SplitCandidate,
    slot: usize,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingSplit {}

impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingSplit {
    // Largest gain first, earlier slot on ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.split
            .gain
            .total_cmp(&other.split.gain)
            .then(other.slot.cmp(&self.slot))
    }
}

enum NodeSlot {
    Leaf { indices: Vec<usize>, depth: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

impl LightGBMConfig {
    fn split_params(&self) -> SplitParams {
        SplitParams {
            reg_lambda: self.reg_lambda,
            min_child_weight: 1e-3,
            min_samples_leaf: self.min_child_samples.max(1),
        }
    }

    fn can_split(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |d| depth < d)
    }

    fn to_node(&self, slots: &[NodeSlot], idx: usize, grad: &Array1<f64>, hess: &Array1<f64>) -> BoostNode {
        match &slots[idx] {
            NodeSlot::Leaf { indices, .. } => BoostNode::Leaf {
                weight: leaf_for(grad, hess, indices, self.reg_lambda),
            },
            NodeSlot::Split {
                feature,
                threshold,
                left,
                right,
            } => BoostNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(self.to_node(slots, *left, grad, hess)),
                right: Box::new(self.to_node(slots, *right, grad, hess)),
            },
        }
    }
}

impl TreeGrower for LightGBMConfig {
    fn grow(&self, x: &Array2<f64>, grad: &Array1<f64>, hess: &Array1<f64>, stream: u64) -> BoostNode {
        let n_features = x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        if self.colsample_bytree < 1.0 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state.wrapping_add(stream));
            features.shuffle(&mut rng);
            features.truncate(((n_features as f64 * self.colsample_bytree).ceil() as usize).max(1));
        }

        let params = self.split_params();
        let root: Vec<usize> = (0..x.nrows()).collect();
        let mut heap = BinaryHeap::new();
        if let Some(split) = find_best_split(x, grad, hess, &root, &features, params) {
            heap.push(PendingSplit { split, slot: 0 });
        }
        let mut slots = vec![NodeSlot::Leaf {
            indices: root,
            depth: 0,
        }];

        let mut n_leaves = 1;
        while n_leaves < self.num_leaves {
            let Some(PendingSplit { split, slot }) = heap.pop() else {
                break;
            };
            if split.gain <= 0.0 {
                break;
            }
            let (indices, depth) = match &slots[slot] {
                NodeSlot::Leaf { indices, depth } => (indices.clone(), *depth),
                NodeSlot::Split { .. } => continue,
            };

            let (left_idx, right_idx) = partition(x, &indices, &split);
            let left = slots.len();
            let right = left + 1;
            for (child, child_idx) in [(left, &left_idx), (right, &right_idx)] {
                if self.can_split(depth + 1) {
                    if let Some(s) = find_best_split(x, grad, hess, child_idx, &features, params) {
                        heap.push(PendingSplit { split: s, slot: child });
                    }
                }
            }
            slots.push(NodeSlot::Leaf {
                indices: left_idx,
                depth: depth + 1,
            });
            slots.push(NodeSlot::Leaf {
                indices: right_idx,
                depth: depth + 1,
            });
            slots[slot] = NodeSlot::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            n_leaves += 1;
        }

        self.to_node(&slots, 0, grad, hess)
    }
}

/// LightGBM-style booster for both tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBM {
    pub config: LightGBMConfig,
    is_classification: bool,
    ensemble: Option<BoostedTrees>,
}

impl LightGBM {
    pub fn classifier(config: LightGBMConfig) -> Self {
        Self {
            config,
            is_classification: true,
            ensemble: None,
        }
    }

    pub fn regressor(config: LightGBMConfig) -> Self {
        Self {
            config,
            is_classification: false,
            ensemble: None,
        }
    }
}

impl Model for LightGBM {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.config.num_leaves < 2 {
            return Err(SelectError::invalid_param(
                "num_leaves",
                self.config.num_leaves,
                "must be at least 2",
            ));
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
            .ok_or_else(|| SelectError::NotFitted("LightGBM".to_string()))?
            .predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.ensemble.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_config() -> LightGBMConfig {
        LightGBMConfig {
            n_estimators: 30,
            num_leaves: 8,
            min_child_samples: 2,
            learning_rate: 0.3,
            ..Default::default()
        }
    }

    #[test]
    fn test_regressor() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v < 20.0 { -2.0 } else { 2.0 });
        let mut model = LightGBM::regressor(small_config());
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[3.0], [30.0]]).unwrap();
        assert!((pred[0] + 2.0).abs() < 0.5, "{:?}", pred);
        assert!((pred[1] - 2.0).abs() < 0.5, "{:?}", pred);
    }

    #[test]
    fn test_leaf_budget_respected() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| (v * 0.3).sin());
        let config = LightGBMConfig {
            n_estimators: 2,
            num_leaves: 5,
            min_child_samples: 2,
            ..Default::default()
        };
        let mut model = LightGBM::regressor(config);
        model.fit(&x, &y).unwrap();
        assert!(model.ensemble.as_ref().unwrap().trees().all(|t| t.n_leaves() <= 5));
    }

    #[test]
    fn test_multiclass() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| (v / 10.0).floor());
        let mut model = LightGBM::classifier(small_config());
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[2.0], [15.0], [27.0]]).unwrap();
        assert_eq!(pred.to_vec(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_default_min_child_samples_keeps_small_data_constant() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let mut model = LightGBM::regressor(LightGBMConfig {
            n_estimators: 5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|p| (p - 1.5).abs() < 1e-9));
    }
}
