//! Bagged regression trees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForecastError;
use crate::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
    pub bootstrap: bool,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (`None` = all).
    pub max_features: Option<usize>,
    /// Worker threads used to grow trees. Results do not depend on it.
    pub num_threads: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 0,
            bootstrap: true,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            num_threads: 1,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            ..TreeParams::default()
        }
    }

    /// Seed of the `i`-th tree, independent of the thread that grows it.
    fn tree_seed(&self, i: usize) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(i as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self, ForecastError> {
        const MODEL: &str = "random_forest";

        if params.n_estimators == 0 {
            return Err(ForecastError::fit(MODEL, "n_estimators must be >= 1"));
        }
        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastError::fit(
                MODEL,
                format!("expected matching non-empty inputs (rows={}, targets={})", x.len(), y.len()),
            ));
        }
        if x.iter().flatten().any(|v| v.is_nan()) {
            return Err(ForecastError::fit(MODEL, "input contains missing values; impute first"));
        }

        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let tree_params = params.tree_params();
        let n = y.len();

        let grow = |i: usize| -> RegressionTree {
            let mut rng = ChaCha8Rng::seed_from_u64(params.tree_seed(i));
            let samples: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            RegressionTree::fit(x, &grad, &hess, &samples, &tree_params, &mut rng)
        };

        let workers = params.num_threads.clamp(1, params.n_estimators);
        let trees = if workers == 1 {
            (0..params.n_estimators).map(grow).collect()
        } else {
            grow_parallel(params.n_estimators, workers, &grow)?
        };

        debug!(trees = params.n_estimators, rows = n, workers, "random forest fitted");
        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Grow trees `0..count` on a dedicated pool of `workers` threads, keeping index order.
fn grow_parallel<F>(count: usize, workers: usize, grow: &F) -> Result<Vec<RegressionTree>, ForecastError>
where
    F: Fn(usize) -> RegressionTree + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("forest-worker-{i}"))
        .build()
        .map_err(|e| ForecastError::Worker(format!("failed to build forest pool: {e}")))?;

    Ok(pool.install(|| (0..count).into_par_iter().map(grow).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 7) as f64, (i / 3) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] + r[1]).collect();
        (x, y)
    }

    #[test]
    fn same_seed_same_forest_regardless_of_threads() {
        let (x, y) = dataset();
        let single = RandomForest::fit(
            &x,
            &y,
            &ForestParams {
                n_estimators: 13,
                num_threads: 1,
                ..ForestParams::default()
            },
        )
        .unwrap();
        let pooled = RandomForest::fit(
            &x,
            &y,
            &ForestParams {
                n_estimators: 13,
                num_threads: 6,
                ..ForestParams::default()
            },
        )
        .unwrap();

        assert_eq!(single, pooled);
        assert_eq!(pooled.n_trees(), 13);
    }

    #[test]
    fn different_seeds_give_different_bootstraps() {
        let (x, y) = dataset();
        let a = RandomForest::fit(&x, &y, &ForestParams { n_estimators: 5, ..ForestParams::default() }).unwrap();
        let b = RandomForest::fit(
            &x,
            &y,
            &ForestParams {
                n_estimators: 5,
                seed: 42,
                ..ForestParams::default()
            },
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let (x, y) = dataset();
        let forest = RandomForest::fit(&x, &y, &ForestParams::default()).unwrap();
        let (lo, hi) = y
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        for row in &x {
            let p = forest.predict(row);
            assert!(p >= lo && p <= hi);
        }
        // Close to the training target on average.
        let mae = x
            .iter()
            .zip(&y)
            .map(|(r, t)| (forest.predict(r) - t).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < 3.0, "mae was {mae}");
    }

    #[test]
    fn rejects_missing_values_and_empty_input() {
        let err = RandomForest::fit(&[vec![f64::NAN]], &[1.0], &ForestParams::default()).unwrap_err();
        assert!(err.to_string().contains("impute"));

        let err = RandomForest::fit(&[], &[], &ForestParams::default()).unwrap_err();
        assert!(matches!(err, ForecastError::Fit { .. }));
    }
}
