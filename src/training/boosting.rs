//! Second-order gradient boosting shared by the XGBoost and LightGBM
//! families
//!
//! - Leaf weights: w* = -G / (H + lambda)
//! - Split gain: 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)]
//! - Squared error for regression, softmax with one tree per class per
//!   round for classification

use super::models::{argmax, check_width, check_xy, class_count};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A node of a boosted regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoostNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                BoostNode::Leaf { weight } => return *weight,
                BoostNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => node = if row[*feature] <= *threshold { left } else { right },
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            BoostNode::Leaf { .. } => 1,
            BoostNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Constraints on a candidate split
#[derive(Debug, Clone, Copy)]
pub struct SplitParams {
    pub reg_lambda: f64,
    pub min_child_weight: f64,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SplitCandidate {
    pub feature: usize,
    pub threshold: f64,
    pub gain: f64,
}

pub fn leaf_weight(g_sum: f64, h_sum: f64, reg_lambda: f64) -> f64 {
    -g_sum / (h_sum + reg_lambda)
}

pub fn leaf_for(grad: &Array1<f64>, hess: &Array1<f64>, indices: &[usize], reg_lambda: f64) -> f64 {
    let g: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h: f64 = indices.iter().map(|&i| hess[i]).sum();
    leaf_weight(g, h, reg_lambda)
}

/// Exact greedy split search across `features`, scanned in parallel
pub fn find_best_split(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    features: &[usize],
    params: SplitParams,
) -> Option<SplitCandidate> {
    if indices.len() < 2 * params.min_samples_leaf.max(1) {
        return None;
    }
    let g_total: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = indices.iter().map(|&i| hess[i]).sum();
    let lambda = params.reg_lambda;
    let parent_score = g_total * g_total / (h_total + lambda);

    features
        .par_iter()
        .filter_map(|&feature| {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            let mut best: Option<SplitCandidate> = None;
            for pos in 0..sorted.len() - 1 {
                let idx = sorted[pos];
                g_left += grad[idx];
                h_left += hess[idx];

                let (here, next) = (x[[idx, feature]], x[[sorted[pos + 1], feature]]);
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < params.min_samples_leaf || sorted.len() - n_left < params.min_samples_leaf {
                    continue;
                }
                let (g_right, h_right) = (g_total - g_left, h_total - h_left);
                if h_left < params.min_child_weight || h_right < params.min_child_weight {
                    continue;
                }

                let gain = 0.5
                    * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                        - parent_score);
                if best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
            best
        })
        .max_by(|a, b| a.gain.total_cmp(&b.gain).then(b.feature.cmp(&a.feature)))
}

pub fn partition(x: &Array2<f64>, indices: &[usize], split: &SplitCandidate) -> (Vec<usize>, Vec<usize>) {
    indices
        .iter()
        .partition(|&&i| x[[i, split.feature]] <= split.threshold)
}

/// Loss being boosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    SquaredError,
    Softmax { n_classes: usize },
}

impl Loss {
    fn n_outputs(&self) -> usize {
        match self {
            Loss::SquaredError => 1,
            Loss::Softmax { n_classes } => *n_classes,
        }
    }
}

/// Grows one tree from gradients. Arguments: gradient, hessian and a
/// stream id unique to the (round, output) pair, for seeding.
pub trait TreeGrower: Sync {
    fn grow(&self, x: &Array2<f64>, grad: &Array1<f64>, hess: &Array1<f64>, stream: u64) -> BoostNode;
}

/// Fitted additive ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedTrees {
    loss: Loss,
    learning_rate: f64,
    base_scores: Vec<f64>,
    /// One tree per output per round
    rounds: Vec<Vec<BoostNode>>,
    n_features: usize,
}

impl BoostedTrees {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        is_classification: bool,
        n_rounds: usize,
        learning_rate: f64,
        grower: &impl TreeGrower,
    ) -> Result<Self> {
        check_xy(x, y)?;
        if n_rounds == 0 {
            return Err(SelectError::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        if !(learning_rate > 0.0) {
            return Err(SelectError::invalid_param("learning_rate", learning_rate, "must be positive"));
        }

        let n = x.nrows();
        let loss = if is_classification {
            Loss::Softmax {
                n_classes: class_count(y)?.max(2),
            }
        } else {
            Loss::SquaredError
        };
        let k = loss.n_outputs();

        let base_scores: Vec<f64> = match loss {
            Loss::SquaredError => vec![y.mean().unwrap_or(0.0)],
            Loss::Softmax { n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &v in y.iter() {
                    counts[v as usize] += 1.0;
                }
                counts.iter().map(|c| ((c + 1.0) / (n as f64 + n_classes as f64)).ln()).collect()
            }
        };

        let mut raw = Array2::from_shape_fn((n, k), |(_, c)| base_scores[c]);
        let mut rounds = Vec::with_capacity(n_rounds);

        for round in 0..n_rounds {
            let (grads, hessians) = Self::gradients(loss, &raw, y);
            let trees: Vec<BoostNode> = (0..k)
                .into_par_iter()
                .map(|c| grower.grow(x, &grads[c], &hessians[c], (round * k + c) as u64))
                .collect();

            for (c, tree) in trees.iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    raw[[i, c]] += learning_rate * tree.predict_row(row);
                }
            }
            rounds.push(trees);
        }

        if raw.iter().any(|v| !v.is_finite()) {
            return Err(SelectError::Training("boosting diverged".to_string()));
        }

        Ok(Self {
            loss,
            learning_rate,
            base_scores,
            rounds,
            n_features: x.ncols(),
        })
    }

    fn gradients(loss: Loss, raw: &Array2<f64>, y: &Array1<f64>) -> (Vec<Array1<f64>>, Vec<Array1<f64>>) {
        match loss {
            Loss::SquaredError => {
                let grad = &raw.column(0) - y;
                let hess = Array1::ones(y.len());
                (vec![grad], vec![hess])
            }
            Loss::Softmax { n_classes } => {
                let proba = softmax(raw);
                let mut grads = Vec::with_capacity(n_classes);
                let mut hessians = Vec::with_capacity(n_classes);
                for c in 0..n_classes {
                    let p = proba.column(c);
                    grads.push(Array1::from_shape_fn(y.len(), |i| {
                        p[i] - if y[i] as usize == c { 1.0 } else { 0.0 }
                    }));
                    hessians.push(p.mapv(|v| (v * (1.0 - v)).max(1e-6)));
                }
                (grads, hessians)
            }
        }
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Array2<f64> {
        let k = self.base_scores.len();
        let mut raw = Array2::from_shape_fn((x.nrows(), k), |(_, c)| self.base_scores[c]);
        for trees in &self.rounds {
            for (c, tree) in trees.iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    raw[[i, c]] += self.learning_rate * tree.predict_row(row);
                }
            }
        }
        raw
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x)?;
        let raw = self.raw_scores(x);
        Ok(match self.loss {
            Loss::SquaredError => raw.column(0).to_owned(),
            Loss::Softmax { .. } => raw.rows().into_iter().map(|r| argmax(r) as f64).collect(),
        })
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    #[cfg(test)]
    pub(crate) fn trees(&self) -> impl Iterator<Item = &BoostNode> {
        self.rounds.iter().flatten()
    }
}

fn softmax(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}
