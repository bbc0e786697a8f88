//! Gradient-boosted regression trees (squared error).
//!
//! Each round fits a tree to the gradients of the current predictions with
//! L2-regularised leaf weights, then adds it scaled by the learning rate.
//! Missing feature values are accepted as-is; every split learns where to
//! send them.

use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForecastError;
use crate::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    /// Fraction of rows sampled per round; `1.0` uses every row.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Result<Self, ForecastError> {
        const MODEL: &str = "gradient_boosting";

        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastError::fit(
                MODEL,
                format!("expected matching non-empty inputs (rows={}, targets={})", x.len(), y.len()),
            ));
        }
        if !(params.learning_rate.is_finite() && params.learning_rate > 0.0) {
            return Err(ForecastError::fit(MODEL, "learning_rate must be positive"));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(ForecastError::fit(MODEL, "subsample must be in (0, 1]"));
        }

        let n = y.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            lambda: params.lambda,
            gamma: params.gamma,
            min_child_weight: params.min_child_weight,
            ..TreeParams::default()
        };

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut predictions = vec![base_score; n];
        let hess = vec![1.0; n];
        let all_rows: Vec<usize> = (0..n).collect();
        let per_round = ((n as f64) * params.subsample).ceil().max(1.0) as usize;

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let grad: Vec<f64> = predictions.iter().zip(y).map(|(p, t)| p - t).collect();
            let rows = if per_round < n {
                let mut picked = sample(&mut rng, n, per_round).into_vec();
                picked.sort_unstable();
                picked
            } else {
                all_rows.clone()
            };

            let tree = RegressionTree::fit(x, &grad, &hess, &rows, &tree_params, &mut rng);
            for (p, row) in predictions.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        debug!(rounds = trees.len(), rows = n, "gradient boosting fitted");
        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }
}
