//! K-Nearest Neighbors
//!
//! Brute-force Euclidean search with a bounded max-heap per query row.

use super::models::{check_width, check_xy, class_count, Model};
use crate::error::{Result, SelectError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    /// Accepted for parity with tree-based neighbour search; the brute-force
    /// scan does not use it.
    pub leaf_size: usize,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            leaf_size: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor {
    distance: f64,
    target: f64,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

/// K-Nearest Neighbors classifier, majority vote over the `k` closest rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNN {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Array1<f64>,
    n_classes: usize,
}

impl KNN {
    pub fn classifier(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: Array1::zeros(0),
            n_classes: 0,
        }
    }

    fn k_nearest(&self, x_train: &Array2<f64>, query: ArrayView1<f64>) -> Vec<Neighbor> {
        let k = self.config.n_neighbors;
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (row, &target) in x_train.rows().into_iter().zip(self.y_train.iter()) {
            let distance: f64 = row.iter().zip(query.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            if heap.len() < k {
                heap.push(Neighbor { distance, target });
            } else if heap.peek().map_or(false, |worst| distance < worst.distance) {
                heap.pop();
                heap.push(Neighbor { distance, target });
            }
        }
        heap.into_vec()
    }

    fn vote(&self, neighbors: &[Neighbor]) -> f64 {
        let mut votes = vec![0usize; self.n_classes.max(1)];
        for n in neighbors {
            if let Some(v) = votes.get_mut(n.target as usize) {
                *v += 1;
            }
        }
        votes
            .iter()
            .enumerate()
            .fold((0, 0), |(bc, bn), (c, &n)| if n > bn { (c, n) } else { (bc, bn) })
            .0 as f64
    }
}

impl Model for KNN {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let k = self.config.n_neighbors;
        if k == 0 {
            return Err(SelectError::invalid_param("n_neighbors", k, "must be at least 1"));
        }
        if k > x.nrows() {
            return Err(SelectError::invalid_param(
                "n_neighbors",
                k,
                &format!("exceeds the {} training rows", x.nrows()),
            ));
        }
        self.n_classes = class_count(y)?;
        self.x_train = Some(x.clone());
        self.y_train = y.clone();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self
            .x_train
            .as_ref()
            .ok_or_else(|| SelectError::NotFitted("KNN".to_string()))?;
        check_width(x_train.ncols(), x)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.vote(&self.k_nearest(x_train, x.row(i))))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }
}
