use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub const SERVICE_MESSAGE: &str = "Material demand and stock forecasting API";

/// Current monthly feature table.
pub async fn monthly_features(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let aggregation = match services.monthly_rows().await {
        Ok(a) => a,
        Err(e) => return ApiError::from(e).into_response(),
    };

    Json(dto::DataResponse {
        message: SERVICE_MESSAGE,
        count: aggregation.rows.len(),
        data: aggregation.rows,
    })
    .into_response()
}
