//! Regression strategies that can be plugged into the forecaster.

use serde::{Deserialize, Serialize};

use crate::boosting::{BoostingParams, GradientBoostedTrees};
use crate::error::ForecastError;
use crate::forest::{ForestParams, RandomForest};
use crate::impute::MeanImputer;

/// A fitted regressor over one feature row.
pub trait Regressor: Send + Sync {
    fn predict_row(&self, row: &[f64]) -> f64;
}

impl Regressor for RandomForest {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.predict(row)
    }
}

impl Regressor for GradientBoostedTrees {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.predict(row)
    }
}

/// Configuration of one ensemble member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    /// Mean imputation followed by a random forest.
    ImputedRandomForest(ForestParams),
    /// Gradient-boosted trees; missing values are handled natively.
    GradientBoosting(BoostingParams),
}

impl EstimatorSpec {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorSpec::ImputedRandomForest(_) => "random_forest",
            EstimatorSpec::GradientBoosting(_) => "gradient_boosting",
        }
    }

    pub fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Result<FittedEstimator, ForecastError> {
        match self {
            EstimatorSpec::ImputedRandomForest(params) => {
                let imputer = MeanImputer::fit(x);
                let forest = RandomForest::fit(&imputer.transform(x), y, params)?;
                Ok(FittedEstimator::ImputedRandomForest { imputer, forest })
            }
            EstimatorSpec::GradientBoosting(params) => {
                Ok(FittedEstimator::GradientBoosting(GradientBoostedTrees::fit(x, y, params)?))
            }
        }
    }

    /// Override the worker pool size where the estimator has one.
    pub fn with_threads(self, num_threads: usize) -> Self {
        match self {
            EstimatorSpec::ImputedRandomForest(params) => {
                EstimatorSpec::ImputedRandomForest(ForestParams { num_threads, ..params })
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedEstimator {
    ImputedRandomForest {
        imputer: MeanImputer,
        forest: RandomForest,
    },
    GradientBoosting(GradientBoostedTrees),
}

impl FittedEstimator {
    pub fn name(&self) -> &'static str {
        match self {
            FittedEstimator::ImputedRandomForest { .. } => "random_forest",
            FittedEstimator::GradientBoosting(_) => "gradient_boosting",
        }
    }
}

impl Regressor for FittedEstimator {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            FittedEstimator::ImputedRandomForest { imputer, forest } => {
                forest.predict_row(&imputer.transform_row(row))
            }
            FittedEstimator::GradientBoosting(model) => model.predict_row(row),
        }
    }
}
