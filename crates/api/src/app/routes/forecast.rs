use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::app::dto;
use crate::app::services::AppServices;

pub async fn train(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let (snapshot, report) = match services.train().await {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    info!(version = %snapshot.version, "training request completed");
    Json(dto::TrainResponse {
        message: "model trained and saved",
        model_version: snapshot.version,
        report,
    })
    .into_response()
}

pub async fn predict(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PredictQuery>,
) -> axum::response::Response {
    let req = match query.validate() {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    let prediction = match services.predict(&req.material, req.horizon).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    Json(dto::PredictResponse {
        material: req.material,
        model_version: prediction.model_version,
        forecasts: prediction.forecasts.into_iter().map(Into::into).collect(),
    })
    .into_response()
}

pub async fn model_info(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let body = match services.registry().current() {
        Some(snapshot) => dto::ModelInfoResponse::from_snapshot(&snapshot),
        None => dto::ModelInfoResponse::untrained(),
    };
    Json(body).into_response()
}
