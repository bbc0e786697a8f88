//! Train/validation partitioning and the training run itself.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockcast_core::YearMonth;

use crate::boosting::BoostingParams;
use crate::error::ForecastError;
use crate::estimator::EstimatorSpec;
use crate::features::{FeatureSpec, LagSpec, LagTransform};
use crate::forecaster::{FittedLagForecaster, Forecaster, LagForecaster, Observation};
use crate::forest::ForestParams;

/// Worker threads used by the forest when nothing else is configured.
pub const DEFAULT_THREADS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Validation month; training uses strictly earlier months.
    pub cutoff: YearMonth,
    pub forecaster: LagForecaster,
}

impl TrainingConfig {
    /// The production ensemble: imputed random forest plus gradient boosting
    /// over lags 2 and 8.
    pub fn standard(cutoff: YearMonth, num_threads: usize) -> Self {
        let estimators = vec![
            EstimatorSpec::ImputedRandomForest(ForestParams::default()).with_threads(num_threads),
            EstimatorSpec::GradientBoosting(BoostingParams::default()),
        ];
        let features = FeatureSpec::new(vec![
            LagSpec::new(
                2,
                vec![
                    LagTransform::RollingMean { window: 4 },
                    LagTransform::RollingMin { window: 4 },
                    LagTransform::RollingMax { window: 4 },
                ],
            ),
            LagSpec::new(8, vec![LagTransform::EwmMean { alpha: 0.5 }]),
        ]);
        Self {
            cutoff,
            forecaster: LagForecaster::new(estimators, features),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub training: Vec<Observation>,
    pub validation: Vec<Observation>,
}

/// Rows before `cutoff` train; rows in the cutoff month validate. Later
/// months are ignored.
pub fn partition(observations: &[Observation], cutoff: YearMonth) -> Partition {
    let mut out = Partition::default();
    for o in observations {
        if o.year_month < cutoff {
            out.training.push(*o);
        } else if o.year_month == cutoff {
            out.validation.push(*o);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub cutoff: YearMonth,
    pub training_rows: usize,
    pub validation_rows: usize,
    pub series: usize,
    /// Validation rows whose material had training history.
    pub evaluated_rows: usize,
    /// Validation error per ensemble member and for the ensemble mean.
    pub metrics: BTreeMap<String, ErrorMetrics>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: FittedLagForecaster,
    pub report: TrainingReport,
}

pub fn train(observations: &[Observation], config: &TrainingConfig) -> Result<TrainingOutcome, ForecastError> {
    let started = Instant::now();
    let split = partition(observations, config.cutoff);

    if split.training.is_empty() || split.validation.is_empty() {
        return Err(ForecastError::EmptyPartition {
            cutoff: config.cutoff,
            training_rows: split.training.len(),
            validation_rows: split.validation.len(),
        });
    }

    info!(
        cutoff = %config.cutoff,
        training_rows = split.training.len(),
        validation_rows = split.validation.len(),
        "training forecaster"
    );

    let model = config
        .forecaster
        .fit(&split.training)
        .map_err(ForecastError::during_training)?;

    let (evaluated_rows, metrics) = match evaluate(&model, &split.validation, config.cutoff) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "validation evaluation failed; continuing without metrics");
            (0, BTreeMap::new())
        }
    };

    let report = TrainingReport {
        cutoff: config.cutoff,
        training_rows: split.training.len(),
        validation_rows: split.validation.len(),
        series: model.materials().count(),
        evaluated_rows,
        metrics,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        series = report.series,
        evaluated_rows = report.evaluated_rows,
        duration_ms = report.duration_ms,
        "training finished"
    );

    Ok(TrainingOutcome { model, report })
}

/// Key of the ensemble mean in the metrics table.
pub const ENSEMBLE_METRIC: &str = "ensemble_mean";

fn evaluate(
    model: &FittedLagForecaster,
    validation: &[Observation],
    cutoff: YearMonth,
) -> Result<(usize, BTreeMap<String, ErrorMetrics>), ForecastError> {
    // (sum of absolute errors, sum of squared errors) per model name
    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    let mut evaluated = 0usize;

    for o in validation {
        let Some(history) = model.series(o.material_id) else {
            continue;
        };
        let steps = history.last_month.months_until(cutoff);
        if steps < 1 {
            continue;
        }
        let forecast = model.forecast(o.material_id, steps as usize)?;
        let Some(point) = forecast.points.last() else {
            continue;
        };

        let predictions = point
            .values
            .iter()
            .map(|(name, v)| (name.as_str(), *v))
            .chain(std::iter::once((ENSEMBLE_METRIC, point.mean)));
        for (name, predicted) in predictions {
            let err = predicted - o.demand;
            let entry = sums.entry(name.to_string()).or_insert((0.0, 0.0));
            entry.0 += err.abs();
            entry.1 += err * err;
        }
        evaluated += 1;
    }

    let metrics = sums
        .into_iter()
        .map(|(name, (abs, sq))| {
            let n = evaluated as f64;
            (
                name,
                ErrorMetrics {
                    mae: abs / n,
                    rmse: (sq / n).sqrt(),
                },
            )
        })
        .collect();
    Ok((evaluated, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_core::MaterialId;

    fn ym(y: i32, m: u32) -> YearMonth {
        YearMonth::new(y, m).unwrap()
    }

    fn obs(id: i64, month: YearMonth, demand: f64) -> Observation {
        Observation {
            material_id: MaterialId::new(id),
            year_month: month,
            demand,
        }
    }

    fn history(id: i64, start: YearMonth, values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| obs(id, start.plus_months(i as i32), *v))
            .collect()
    }

    fn fast_config(cutoff: YearMonth) -> TrainingConfig {
        let mut config = TrainingConfig::standard(cutoff, 2);
        for spec in config.forecaster.estimators.iter_mut() {
            match spec {
                EstimatorSpec::ImputedRandomForest(p) => p.n_estimators = 10,
                EstimatorSpec::GradientBoosting(p) => p.n_estimators = 10,
            }
        }
        config
    }

    #[test]
    fn partition_splits_on_the_cutoff_month() {
        let rows = history(1, ym(2024, 1), &[1.0, 2.0, 3.0, 4.0]);
        let split = partition(&rows, ym(2024, 3));
        assert_eq!(split.training.len(), 2);
        assert_eq!(split.validation, vec![obs(1, ym(2024, 3), 3.0)]);
    }

    #[test]
    fn standard_config_has_the_production_features() {
        let config = TrainingConfig::standard(ym(2024, 1), 6);
        assert_eq!(
            config.forecaster.features.names(),
            vec![
                "MaterialID",
                "lag2",
                "rolling_mean_lag2_window_size4",
                "rolling_min_lag2_window_size4",
                "rolling_max_lag2_window_size4",
                "lag8",
                "ewm_mean_lag8_alpha0.5",
            ]
        );
        let names: Vec<_> = config.forecaster.estimators.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["random_forest", "gradient_boosting"]);
        assert!(matches!(
            config.forecaster.estimators[0],
            EstimatorSpec::ImputedRandomForest(p) if p.num_threads == 6 && p.n_estimators == 100 && p.seed == 0
        ));
    }

    #[test]
    fn empty_validation_partition_fails_fast() {
        let rows = history(1, ym(2024, 1), &[1.0, 2.0, 3.0]);
        let err = train(&rows, &fast_config(ym(2025, 1))).unwrap_err();
        match err {
            ForecastError::EmptyPartition {
                training_rows,
                validation_rows,
                ..
            } => {
                assert_eq!(training_rows, 3);
                assert_eq!(validation_rows, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_training_partition_fails_fast() {
        let rows = history(1, ym(2024, 1), &[1.0, 2.0]);
        let err = train(&rows, &fast_config(ym(2024, 1))).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyPartition { training_rows: 0, .. }));
        assert!(err.to_string().contains("2024-01-01"));
    }

    #[test]
    fn trains_and_reports_validation_metrics() {
        let mut rows = history(1, ym(2023, 1), &[10.0, 12.0, 9.0, 11.0, 10.0, 12.0, 9.0, 11.0, 10.0, 12.0]);
        rows.extend(history(2, ym(2023, 1), &[5.0; 10]));
        // Material 3 only appears in the validation month.
        rows.push(obs(3, ym(2023, 10), 1.0));

        let outcome = train(&rows, &fast_config(ym(2023, 10))).unwrap();
        let report = &outcome.report;

        assert_eq!(report.training_rows, 18);
        assert_eq!(report.validation_rows, 3);
        assert_eq!(report.series, 2);
        assert_eq!(report.evaluated_rows, 2);
        for key in ["random_forest", "gradient_boosting", ENSEMBLE_METRIC] {
            let m = report.metrics[key];
            assert!(m.mae >= 0.0 && m.rmse >= m.mae - 1e-12, "{key}: {m:?}");
        }

        let forecast = outcome.model.forecast(MaterialId::new(2), 2).unwrap();
        assert_eq!(forecast.points[0].year_month, ym(2023, 10));
    }

    #[test]
    fn fitting_errors_carry_training_context() {
        let mut rows = history(1, ym(2024, 1), &[1.0, 2.0]);
        rows.push(obs(1, ym(2024, 1), 5.0));
        let err = train(&rows, &fast_config(ym(2024, 2))).unwrap_err();
        assert!(matches!(err, ForecastError::Training(_)));
        assert!(err.to_string().starts_with("error training the model"));
    }
}
