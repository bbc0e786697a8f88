use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockcast_ai::{Forecast, TrainingReport};
use stockcast_core::{MaterialId, YearMonth};
use stockcast_infra::ModelSnapshot;
use stockcast_inventory::MonthlyFeatureRow;

use crate::app::errors::ApiError;

pub const DEFAULT_HORIZON: usize = 3;
pub const MAX_HORIZON: usize = 36;

// -------------------------
// Request DTOs
// -------------------------

/// Raw query string of `/predict`; values are validated by [`PredictQuery::validate`]
/// so malformed input gets the usual JSON error body.
#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub material: Option<String>,
    pub horizon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictRequest {
    pub material: String,
    pub horizon: usize,
}

impl PredictQuery {
    pub fn validate(self) -> Result<PredictRequest, ApiError> {
        let material = self
            .material
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::InvalidRequest("query parameter `material` is required".to_string()))?;

        let horizon = match self.horizon.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_HORIZON,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|h| (1..=MAX_HORIZON).contains(h))
                .ok_or_else(|| {
                    ApiError::InvalidRequest(format!("horizon must be an integer between 1 and {MAX_HORIZON}"))
                })?,
        };

        Ok(PredictRequest { material, horizon })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub message: &'static str,
    pub count: usize,
    pub data: Vec<MonthlyFeatureRow>,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub message: &'static str,
    pub model_version: Uuid,
    pub report: TrainingReport,
}

#[derive(Debug, Serialize)]
pub struct PredictionDto {
    pub year_month: YearMonth,
    pub values: BTreeMap<String, f64>,
    pub mean: f64,
}

#[derive(Debug, Serialize)]
pub struct SeriesForecastDto {
    pub material_id: MaterialId,
    pub predictions: Vec<PredictionDto>,
}

impl From<Forecast> for SeriesForecastDto {
    fn from(f: Forecast) -> Self {
        Self {
            material_id: f.material_id,
            predictions: f
                .points
                .into_iter()
                .map(|p| PredictionDto {
                    year_month: p.year_month,
                    values: p.values,
                    mean: p.mean,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub material: String,
    pub model_version: Uuid,
    pub forecasts: Vec<SeriesForecastDto>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub trained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<YearMonth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TrainingReport>,
}

impl ModelInfoResponse {
    pub fn untrained() -> Self {
        Self {
            trained: false,
            version: None,
            trained_at: None,
            cutoff: None,
            models: Vec::new(),
            features: Vec::new(),
            series: None,
            report: None,
        }
    }

    pub fn from_snapshot(s: &ModelSnapshot) -> Self {
        Self {
            trained: true,
            version: Some(s.version),
            trained_at: Some(s.trained_at),
            cutoff: Some(s.cutoff),
            models: s.model.model_names(),
            features: s.model.feature_names().to_vec(),
            series: Some(s.model.materials().count()),
            report: Some(s.report.clone()),
        }
    }
}
