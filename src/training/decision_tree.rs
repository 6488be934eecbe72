//! CART decision tree
//!
//! Splits are found by sorting the node's rows on each candidate feature
//! and sweeping once, keeping running class counts (Gini) or running sums
//! (MSE). Candidate features are scanned in parallel.

use super::models::{check_width, check_xy, class_count, Model};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// Running statistics of one side of a candidate split
#[derive(Clone)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl SideStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64, sign: isize) {
        if sign > 0 {
            self.count += 1;
            self.sum += y;
            self.sq_sum += y * y;
        } else {
            self.count -= 1;
            self.sum -= y;
            self.sq_sum -= y * y;
        }
        if let Some(c) = self.class_counts.get_mut(y as usize) {
            if sign > 0 {
                *c += 1;
            } else {
                *c -= 1;
            }
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per node (None = all)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: 0,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn new_classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    pub fn new_regressor() -> Self {
        Self::with_criterion(Criterion::MSE)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn is_classification(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    /// Fit on the rows named by `indices`, which may repeat (bootstrap)
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<()> {
        check_xy(x, y)?;
        if indices.is_empty() {
            return Err(SelectError::Data("cannot grow a tree on zero rows".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(SelectError::invalid_param(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }

        self.n_features = x.ncols();
        self.n_classes = if self.is_classification() { class_count(y)? } else { 0 };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let root = self.build(x, y, indices, 0, &mut rng);
        self.root = Some(root);
        Ok(())
    }

    fn stats(&self, y: &Array1<f64>, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::new(self.n_classes);
        for &i in indices {
            stats.add(y[i], 1);
        }
        stats
    }

    fn leaf_value(&self, stats: &SideStats) -> f64 {
        if self.is_classification() {
            // Majority class, lowest label on ties
            stats
                .class_counts
                .iter()
                .enumerate()
                .fold((0, 0), |(bc, bn), (c, &n)| if n > bn { (c, n) } else { (bc, bn) })
                .0 as f64
        } else {
            stats.sum / stats.count.max(1) as f64
        }
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.stats(y, indices);
        let impurity = stats.impurity(self.criterion);
        let leaf = || TreeNode::Leaf {
            value: self.leaf_value(&stats),
            n_samples,
        };

        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12
        {
            return leaf();
        }

        let features: Vec<usize> = match self.max_features {
            Some(k) if k < self.n_features => sample(rng, self.n_features, k.max(1)).into_vec(),
            _ => (0..self.n_features).collect(),
        };

        let best = features
            .par_iter()
            .filter_map(|&f| self.best_split_for(x, y, indices, f, &stats, impurity))
            .max_by(|a, b| a.2.total_cmp(&b.2).then(b.0.cmp(&a.0)));

        let Some((feature_idx, threshold, _gain)) = best else {
            return leaf();
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return leaf();
        }

        let left = Box::new(self.build(x, y, &left_idx, depth + 1, rng));
        let right = Box::new(self.build(x, y, &right_idx, depth + 1, rng));
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
        }
    }

    /// Best `(feature, threshold, gain)` on one feature, if any split helps
    fn best_split_for(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature: usize,
        parent: &SideStats,
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let n = order.len() as f64;
        let mut left = SideStats::new(self.n_classes);
        let mut right = parent.clone();
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..order.len() - 1 {
            let row = order[pos];
            left.add(y[row], 1);
            right.add(y[row], -1);

            let (here, next) = (x[[row, feature]], x[[order[pos + 1], feature]]);
            if here == next {
                continue;
            }
            if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                continue;
            }

            let weighted = (left.count as f64 * left.impurity(self.criterion)
                + right.count as f64 * right.impurity(self.criterion))
                / n;
            let gain = parent_impurity - weighted;
            if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                best = Some((gain, (here + next) / 2.0));
            }
        }

        best.map(|(gain, threshold)| (feature, threshold, gain))
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("DecisionTree".to_string()))?;
        check_width(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}
