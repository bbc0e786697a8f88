//! Lag-feature ensemble forecaster.
//!
//! Every material is one monthly demand series. Training rows are built for
//! every observed position of every series (rows whose lags are not available
//! yet are kept with missing values), each ensemble member is fitted on the
//! same matrix, and forecasting is recursive: a member's prediction for one
//! month becomes part of its own history for the next.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockcast_core::{MaterialId, YearMonth};

use crate::error::ForecastError;
use crate::estimator::{EstimatorSpec, FittedEstimator, Regressor};
use crate::features::FeatureSpec;

/// One point of a demand series, the only columns the model consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub material_id: MaterialId,
    pub year_month: YearMonth,
    pub demand: f64,
}

/// Pluggable forecasting capability: `fit(training set) -> model` and
/// `predict(model, series, horizon) -> forecast`.
pub trait Forecaster {
    type Model;

    fn fit(&self, observations: &[Observation]) -> Result<Self::Model, ForecastError>;

    fn predict(
        &self,
        model: &Self::Model,
        material: MaterialId,
        horizon: usize,
    ) -> Result<Forecast, ForecastError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year_month: YearMonth,
    /// Prediction per ensemble member, keyed by member name.
    pub values: BTreeMap<String, f64>,
    /// Mean over the members.
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub material_id: MaterialId,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagForecaster {
    pub estimators: Vec<EstimatorSpec>,
    pub features: FeatureSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesHistory {
    pub last_month: YearMonth,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLagForecaster {
    features: FeatureSpec,
    feature_names: Vec<String>,
    estimators: Vec<FittedEstimator>,
    series: BTreeMap<MaterialId, SeriesHistory>,
}

impl FittedLagForecaster {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.estimators.iter().map(|e| e.name()).collect()
    }

    pub fn series(&self, material: MaterialId) -> Option<&SeriesHistory> {
        self.series.get(&material)
    }

    pub fn materials(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.series.keys().copied()
    }

    /// Recursive multi-step forecast for one series.
    pub fn forecast(&self, material: MaterialId, horizon: usize) -> Result<Forecast, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::invalid_input("horizon must be >= 1"));
        }
        let history = self
            .series
            .get(&material)
            .ok_or(ForecastError::UnknownSeries(material))?;

        let mut per_model: Vec<(&'static str, Vec<f64>)> = Vec::with_capacity(self.estimators.len());
        for estimator in &self.estimators {
            let mut values = history.values.clone();
            let mut out = Vec::with_capacity(horizon);
            for _ in 0..horizon {
                let row = self.features.row(material, &values);
                let p = estimator.predict_row(&row);
                values.push(p);
                out.push(p);
            }
            per_model.push((estimator.name(), out));
        }

        let points = (0..horizon)
            .map(|step| {
                let values: BTreeMap<String, f64> = per_model
                    .iter()
                    .map(|(name, preds)| (name.to_string(), preds[step]))
                    .collect();
                let mean = if values.is_empty() {
                    0.0
                } else {
                    values.values().sum::<f64>() / values.len() as f64
                };
                ForecastPoint {
                    year_month: history.last_month.plus_months(step as i32 + 1),
                    values,
                    mean,
                }
            })
            .collect();

        Ok(Forecast {
            material_id: material,
            points,
        })
    }
}

impl LagForecaster {
    pub fn new(estimators: Vec<EstimatorSpec>, features: FeatureSpec) -> Self {
        Self { estimators, features }
    }

    fn group_series(observations: &[Observation]) -> Result<BTreeMap<MaterialId, Vec<Observation>>, ForecastError> {
        let mut series: BTreeMap<MaterialId, Vec<Observation>> = BTreeMap::new();
        for o in observations {
            if !o.demand.is_finite() {
                return Err(ForecastError::invalid_input(format!(
                    "non-finite demand for material {} in {}",
                    o.material_id, o.year_month
                )));
            }
            series.entry(o.material_id).or_default().push(*o);
        }
        for (material, points) in series.iter_mut() {
            points.sort_by_key(|o| o.year_month);
            if points.windows(2).any(|w| w[0].year_month == w[1].year_month) {
                return Err(ForecastError::invalid_input(format!(
                    "duplicate month in series of material {material}"
                )));
            }
        }
        Ok(series)
    }
}

impl Forecaster for LagForecaster {
    type Model = FittedLagForecaster;

    fn fit(&self, observations: &[Observation]) -> Result<FittedLagForecaster, ForecastError> {
        if self.estimators.is_empty() {
            return Err(ForecastError::invalid_input("at least one estimator is required"));
        }
        self.features.validate().map_err(ForecastError::InvalidInput)?;
        if observations.is_empty() {
            return Err(ForecastError::invalid_input("no observations to fit"));
        }

        let grouped = Self::group_series(observations)?;

        let mut x: Vec<Vec<f64>> = Vec::with_capacity(observations.len());
        let mut y: Vec<f64> = Vec::with_capacity(observations.len());
        let mut series = BTreeMap::new();

        for (material, points) in &grouped {
            let values: Vec<f64> = points.iter().map(|o| o.demand).collect();
            for t in 0..values.len() {
                x.push(self.features.row(*material, &values[..t]));
                y.push(values[t]);
            }
            if let Some(last) = points.last() {
                series.insert(
                    *material,
                    SeriesHistory {
                        last_month: last.year_month,
                        values,
                    },
                );
            }
        }

        debug!(rows = x.len(), series = series.len(), "training matrix built");

        let mut estimators = Vec::with_capacity(self.estimators.len());
        for spec in &self.estimators {
            let fitted = spec.fit(&x, &y)?;
            info!(model = spec.name(), rows = x.len(), "ensemble member fitted");
            estimators.push(fitted);
        }

        Ok(FittedLagForecaster {
            features: self.features.clone(),
            feature_names: self.features.names(),
            estimators,
            series,
        })
    }

    fn predict(
        &self,
        model: &FittedLagForecaster,
        material: MaterialId,
        horizon: usize,
    ) -> Result<Forecast, ForecastError> {
        model.forecast(material, horizon)
    }
}
