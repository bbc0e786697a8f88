use axum::{
    routing::{get, post},
    Router,
};

pub mod data;
pub mod forecast;
pub mod system;

/// Router for the service endpoints (everything except `/health`).
pub fn router() -> Router {
    Router::new()
        .route("/", get(data::monthly_features))
        .route("/train", post(forecast::train))
        .route("/train/", post(forecast::train))
        .route("/predict", get(forecast::predict))
        .route("/predict/", get(forecast::predict))
        .route("/model", get(forecast::model_info))
}
