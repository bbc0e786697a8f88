//! `stockcast-ai`
//!
//! **Responsibility:** demand forecasting.
//!
//! This crate is intentionally **not** part of the inventory model:
//! - It must not depend on ticket records or aggregation (it consumes plain
//!   [`Observation`]s).
//! - It must not perform I/O; persistence and data loading live in infra.
//! - It produces fitted models and forecasts, nothing else.

pub mod boosting;
pub mod error;
pub mod estimator;
pub mod features;
pub mod forecaster;
pub mod forest;
pub mod impute;
pub mod trainer;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoostedTrees};
pub use error::ForecastError;
pub use estimator::{EstimatorSpec, FittedEstimator, Regressor};
pub use features::{FeatureSpec, LagSpec, LagTransform};
pub use forecaster::{
    FittedLagForecaster, Forecast, ForecastPoint, Forecaster, LagForecaster, Observation, SeriesHistory,
};
pub use forest::{ForestParams, RandomForest};
pub use impute::MeanImputer;
pub use trainer::{
    partition, train, ErrorMetrics, Partition, TrainingConfig, TrainingOutcome, TrainingReport, DEFAULT_THREADS,
    ENSEMBLE_METRIC,
};
