//! Regression tree shared by the forest and the boosted ensemble.
//!
//! Trees are grown from first/second order statistics (`grad`, `hess`) so one
//! builder serves both use cases:
//! - forest: `grad = -y`, `hess = 1`, `lambda = 0` makes leaves the sample mean
//!   and the split gain the reduction of squared error;
//! - boosting: gradients of the squared loss with L2 regularisation.
//!
//! Missing values (`NaN`) are routed by a per-split default direction learned
//! during training.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Minimum hessian sum per child.
    pub min_child_weight: f64,
    /// L2 regularisation on leaf weights.
    pub lambda: f64,
    /// Minimum gain required to split.
    pub gamma: f64,
    /// Features considered per split (`None` = all).
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            gamma: 0.0,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        missing_left: bool,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    missing_left: bool,
    gain: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a TreeParams,
    n_features: usize,
    rng: &'a mut ChaCha8Rng,
    nodes: Vec<Node>,
}

const MIN_GAIN: f64 = 1e-12;

/// Threshold of a split that only separates missing from present values.
const SEPARATE_MISSING: f64 = f64::MAX;

impl RegressionTree {
    /// Grow a tree over `samples` (indices into `x`; duplicates allowed).
    pub fn fit(
        x: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let mut builder = Builder {
            x,
            grad,
            hess,
            params,
            n_features,
            rng,
            nodes: Vec::new(),
        };
        builder.build(samples.to_vec(), 0);
        Self { nodes: builder.nodes }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    let go_left = if v.is_nan() { *missing_left } else { v < *threshold };
                    idx = if go_left { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 { 0.0 } else { g * g / denom }
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 { 0.0 } else { -g / denom }
}

impl Builder<'_> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let (g, h) = self.sums(&samples);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: leaf_weight(g, h, self.params.lambda),
        });

        let depth_ok = self.params.max_depth.is_none_or(|d| depth < d);
        if !depth_ok || samples.len() < self.params.min_samples_split.max(2) {
            return idx;
        }

        let Some(split) = self.best_split(&samples, g, h) else {
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&s| {
                let v = self.x[s][split.feature];
                if v.is_nan() { split.missing_left } else { v < split.threshold }
            });

        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            missing_left: split.missing_left,
            left,
            right,
        };
        idx
    }

    fn sums(&self, samples: &[usize]) -> (f64, f64) {
        samples
            .iter()
            .fold((0.0, 0.0), |(g, h), &s| (g + self.grad[s], h + self.hess[s]))
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = self.params.max_features {
            if k < self.n_features {
                features.shuffle(&mut *self.rng);
                features.truncate(k.max(1));
                features.sort_unstable();
            }
        }
        features
    }

    fn best_split(&mut self, samples: &[usize], g_total: f64, h_total: f64) -> Option<Split> {
        let lambda = self.params.lambda;
        let parent = score(g_total, h_total, lambda);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let min_weight = self.params.min_child_weight;
        let mut best: Option<Split> = None;

        for feature in self.candidate_features() {
            let mut present: Vec<(f64, f64, f64)> = samples
                .iter()
                .filter_map(|&s| {
                    let v = self.x[s][feature];
                    (!v.is_nan()).then(|| (v, self.grad[s], self.hess[s]))
                })
                .collect();
            let n_missing = samples.len() - present.len();
            if present.is_empty() || (present.len() < 2 && n_missing == 0) {
                continue;
            }
            present.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (g_present, h_present) = present
                .iter()
                .fold((0.0, 0.0), |(g, h), p| (g + p.1, h + p.2));
            let g_missing = g_total - g_present;
            let h_missing = h_total - h_present;

            let directions: &[bool] = if n_missing == 0 { &[false] } else { &[true, false] };

            // Position `i` puts present[..=i] on the left. The last position
            // (all present values left, missing values right) only exists when
            // something is missing.
            let (mut gl, mut hl) = (0.0, 0.0);
            for i in 0..present.len() {
                gl += present[i].1;
                hl += present[i].2;
                let last = i + 1 == present.len();
                let threshold = if last {
                    if n_missing == 0 {
                        break;
                    }
                    SEPARATE_MISSING
                } else {
                    let (v, next) = (present[i].0, present[i + 1].0);
                    if v == next {
                        continue;
                    }
                    let mid = v + (next - v) / 2.0;
                    if mid <= v { next } else { mid }
                };

                for &missing_left in directions {
                    if last && missing_left {
                        continue;
                    }
                    let (g_l, h_l, n_l) = if missing_left {
                        (gl + g_missing, hl + h_missing, i + 1 + n_missing)
                    } else {
                        (gl, hl, i + 1)
                    };
                    let n_r = samples.len() - n_l;
                    let (g_r, h_r) = (g_total - g_l, h_total - h_l);

                    if n_l < min_leaf || n_r < min_leaf || h_l < min_weight || h_r < min_weight {
                        continue;
                    }

                    let gain = score(g_l, h_l, lambda) + score(g_r, h_r, lambda) - parent;
                    if gain <= self.params.gamma + MIN_GAIN {
                        continue;
                    }
                    if best.is_none_or(|b| gain > b.gain) {
                        best = Some(Split {
                            feature,
                            threshold,
                            missing_left,
                            gain,
                        });
                    }
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fit_mean_tree(x: &[Vec<f64>], y: &[f64], params: TreeParams) -> RegressionTree {
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let samples: Vec<usize> = (0..y.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        RegressionTree::fit(x, &grad, &hess, &samples, &params, &mut rng)
    }

    #[test]
    fn unsplittable_data_gives_mean_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let tree = fit_mean_tree(&x, &[1.0, 2.0, 6.0], TreeParams::default());
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict(&[1.0]), 3.0);
    }

    #[test]
    fn learns_a_step_function_exactly() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 2.0 } else { 9.0 }).collect();
        let tree = fit_mean_tree(&x, &y, TreeParams::default());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[0.0]), 2.0);
        assert_eq!(tree.predict(&[4.4]), 2.0);
        assert_eq!(tree.predict(&[4.6]), 9.0);
        assert_eq!(tree.predict(&[100.0]), 9.0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let tree = fit_mean_tree(&x, &y, params);
        assert!(tree.depth() <= 2);
        assert!(tree.leaf_count() <= 4);
    }

    #[test]
    fn missing_values_follow_learned_direction() {
        // Missing feature values always come with the high target.
        let x = vec![
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![f64::NAN],
            vec![f64::NAN],
            vec![10.0],
        ];
        let y = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let tree = fit_mean_tree(&x, &y, TreeParams::default());

        assert_eq!(tree.predict(&[f64::NAN]), 5.0);
        assert_eq!(tree.predict(&[2.0]), 0.0);
        assert_eq!(tree.predict(&[11.0]), 5.0);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let y = [0.0, 0.0, 0.0, 0.0, 0.0, 100.0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = fit_mean_tree(&x, &y, params);
        // The outlier cannot be isolated in its own leaf.
        assert!(tree.predict(&[5.0]) < 100.0);
    }
}
