//! Service wiring: data loading, training and prediction on top of infra.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockcast_ai::{train, Forecast, Observation, TrainingConfig, TrainingReport};
use stockcast_core::{MaterialId, YearMonth};
use stockcast_infra::{
    Config, FileModelStore, ModelRegistry, ModelSnapshot, MySqlTicketSource, SourceError, TicketSource,
};
use stockcast_inventory::{aggregate_monthly, MonthlyAggregation, MonthlyFeatureRow};

use crate::app::errors::ApiError;

pub struct AppServices {
    source: Arc<dyn TicketSource>,
    registry: Arc<ModelRegistry>,
    train_cutoff: Option<YearMonth>,
    forecast_threads: usize,
}

/// Result of a successful prediction request.
#[derive(Debug)]
pub struct Prediction {
    pub model_version: uuid::Uuid,
    pub forecasts: Vec<Forecast>,
}

impl AppServices {
    pub fn new(
        source: Arc<dyn TicketSource>,
        registry: Arc<ModelRegistry>,
        train_cutoff: Option<YearMonth>,
        forecast_threads: usize,
    ) -> Self {
        Self {
            source,
            registry,
            train_cutoff,
            forecast_threads: forecast_threads.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Validation month of the next training run.
    pub fn cutoff(&self) -> YearMonth {
        self.train_cutoff
            .unwrap_or_else(|| YearMonth::from_datetime(Utc::now().naive_utc()))
    }

    /// Load ticket events and aggregate them into monthly feature rows.
    #[instrument(skip(self))]
    pub async fn monthly_rows(&self) -> Result<MonthlyAggregation, SourceError> {
        let records = self.source.fetch_ticket_records().await?;
        let aggregation = aggregate_monthly(&records);
        info!(
            records = records.len(),
            rows = aggregation.rows.len(),
            dropped_rows = aggregation.exclusions.dropped_rows,
            "monthly features aggregated"
        );
        Ok(aggregation)
    }

    /// Train on all aggregated rows, persist the model and start serving it.
    pub async fn train(&self) -> Result<(Arc<ModelSnapshot>, TrainingReport), ApiError> {
        let permit = self.registry.begin_training().await;

        let aggregation = self.monthly_rows().await?;
        let observations: Vec<Observation> = aggregation.rows.iter().map(observation).collect();
        let config = TrainingConfig::standard(self.cutoff(), self.forecast_threads);
        let registry = self.registry.clone();

        let snapshot = tokio::task::spawn_blocking(move || {
            let outcome = train(&observations, &config).map_err(ApiError::from_training)?;
            let snapshot = ModelSnapshot::new(outcome.model, outcome.report);
            registry.publish(&permit, snapshot).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("training task failed: {e}")))??;

        let report = snapshot.report.clone();
        Ok((snapshot, report))
    }

    /// Forecast `horizon` months for every series whose rows carry `material`
    /// as display name.
    pub async fn predict(&self, material: &str, horizon: usize) -> Result<Prediction, ApiError> {
        let snapshot = self.registry.current().ok_or(ApiError::ModelNotTrained)?;

        let aggregation = self.monthly_rows().await?;
        let ids = material_ids(&aggregation.rows, material);
        if ids.is_empty() {
            return Err(ApiError::NotFound(format!("material '{material}' not found")));
        }

        let trained: Vec<MaterialId> = ids
            .into_iter()
            .filter(|id| snapshot.model.series(*id).is_some())
            .collect();
        if trained.is_empty() {
            return Err(ApiError::NotFound(format!(
                "material '{material}' has no trained history"
            )));
        }

        let model_version = snapshot.version;
        let forecasts = tokio::task::spawn_blocking(move || {
            trained
                .into_iter()
                .map(|id| snapshot.model.forecast(id, horizon).map_err(ApiError::from_forecast))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;

        Ok(Prediction {
            model_version,
            forecasts,
        })
    }
}

fn observation(row: &MonthlyFeatureRow) -> Observation {
    Observation {
        material_id: row.material_id,
        year_month: row.year_month,
        demand: row.demand,
    }
}

fn material_ids(rows: &[MonthlyFeatureRow], material: &str) -> BTreeSet<MaterialId> {
    rows.iter()
        .filter(|r| r.material_name == material)
        .map(|r| r.material_id)
        .collect()
}

/// Production wiring: MySQL source, JSON model file.
pub fn build_services(config: &Config) -> Result<AppServices, SourceError> {
    let source = MySqlTicketSource::connect_lazy(&config.database)?;
    let store = FileModelStore::new(config.model_path.clone());
    let registry = ModelRegistry::load(Arc::new(store));

    Ok(AppServices::new(
        Arc::new(source),
        Arc::new(registry),
        config.train_cutoff,
        config.forecast_threads,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str) -> MonthlyFeatureRow {
        MonthlyFeatureRow {
            material_id: MaterialId::new(id),
            year_month: YearMonth::new(2024, 1).unwrap(),
            demand: 1.0,
            real_usage: 1.0,
            stock_actual: 0.0,
            material_name: name.to_string(),
        }
    }

    #[test]
    fn names_resolve_to_every_matching_id() {
        let rows = vec![row(1, "Router"), row(2, "Cable"), row(3, "Router")];
        let ids: Vec<_> = material_ids(&rows, "Router").into_iter().collect();
        assert_eq!(ids, vec![MaterialId::new(1), MaterialId::new(3)]);
        assert!(material_ids(&rows, "router").is_empty());
    }
}
