//! ## Regression Estimator
//!
//! The orchestrator treats its final stage as an opaque [`Regressor`]. The default is a
//! [`RandomForestRegressor`]: bootstrap-sampled CART regression trees grown in parallel with
//! `rayon`, each seeded with `random_state + tree_index`, predicting the mean over trees.
//! Given the same data and seed, fitting always yields the same forest regardless of how many
//! threads rayon uses.

use crate::exceptions::{BikeshareError, BikeshareResult};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Fit/predict capability of the final pipeline stage.
pub trait Regressor: Debug + Clone + Send + Sync + Serialize + DeserializeOwned {
    /// Fits the model on a feature matrix and a target vector of the same length.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> BikeshareResult<()>;

    /// Predicts one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> BikeshareResult<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits shared by every tree of a forest.
#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

/// A CART regression tree minimizing the within-node squared error.
///
/// Nodes live in a flat arena (root at index 0) so that deep trees serialize without nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

fn mean_of(y: &ArrayView1<f64>, indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

impl RegressionTree {
    fn fit(x: &Array2<f64>, y: &ArrayView1<f64>, params: TreeParams) -> Self {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, &indices, 0, params);
        tree
    }

    /// Grows the subtree for `indices` and returns the arena index of its root.
    fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &ArrayView1<f64>,
        indices: &[usize],
        depth: usize,
        params: TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: mean_of(y, indices),
        });
        let n = indices.len();
        if n < params.min_samples_split
            || n < 2 * params.min_samples_leaf
            || params.max_depth.is_some_and(|d| depth >= d)
        {
            return id;
        }
        let Some((feature, threshold)) = Self::best_split(x, y, indices, params.min_samples_leaf)
        else {
            return id;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] <= threshold);
        let left = self.grow(x, y, &left_rows, depth + 1, params);
        let right = self.grow(x, y, &right_rows, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Sorted sweep over every feature. Returns the split with the largest reduction of the sum
    /// of squared errors; ties keep the lowest feature index and the lowest threshold.
    fn best_split(
        x: &Array2<f64>,
        y: &ArrayView1<f64>,
        indices: &[usize],
        min_leaf: usize,
    ) -> Option<(usize, f64)> {
        let n = indices.len();
        if indices.iter().all(|&i| y[i] == y[indices[0]]) {
            return None;
        }
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = indices.to_vec();
        for feature in 0..x.ncols() {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let yi = y[order[k]];
                left_sum += yi;
                left_sq += yi * yi;
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let current = x[[order[k], feature]];
                let next = x[[order[k + 1], feature]];
                if current == next {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);
                let gain = parent_sse - sse;
                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, current + (next - current) / 2.0, gain));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Bagged ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub random_state: u64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: 0,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn validate_params(&self) -> BikeshareResult<()> {
        if self.n_estimators == 0 {
            return Err(BikeshareError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(BikeshareError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(BikeshareError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> BikeshareResult<()> {
        self.validate_params()?;
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(BikeshareError::InvalidData(format!(
                "Feature matrix has {} rows but target has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(BikeshareError::EmptyDataset(
                "Cannot fit a forest on zero rows".to_string(),
            ));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(BikeshareError::InvalidData(
                "Training data contains non-finite values".to_string(),
            ));
        }

        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        };
        let base_seed = self.random_state;
        let trees: Vec<RegressionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                let x_boot = x.select(Axis(0), &sample);
                let y_boot: Array1<f64> = sample.iter().map(|&i| y[i]).collect();
                RegressionTree::fit(&x_boot, &y_boot.view(), params)
            })
            .collect();

        self.trees = trees;
        self.n_features = x.ncols();
        tracing::debug!(
            trees = self.trees.len(),
            rows = n_samples,
            features = self.n_features,
            "random forest fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> BikeshareResult<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(BikeshareError::NotFitted("RandomForestRegressor".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(BikeshareError::InvalidData(format!(
                "Expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let n_trees = self.trees.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                self.trees
                    .iter()
                    .map(|tree| tree.predict_row(x.row(i)))
                    .sum::<f64>()
                    / n_trees
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
