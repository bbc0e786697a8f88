use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use stockcast_ai::ForecastError;
use stockcast_infra::{ModelStoreError, SourceError};

/// Every failure an endpoint can report, with its HTTP mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    DataSource(#[from] SourceError),

    #[error("{0}")]
    EmptyPartition(String),

    #[error("{0}")]
    Training(String),

    #[error("the model is not trained; call POST /train first")]
    ModelNotTrained,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    ModelStore(#[from] ModelStoreError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Map a training-run failure.
    pub fn from_training(err: ForecastError) -> Self {
        match err {
            e @ ForecastError::EmptyPartition { .. } => ApiError::EmptyPartition(e.to_string()),
            e => ApiError::Training(e.to_string()),
        }
    }

    /// Map a failure while forecasting with an already trained model.
    pub fn from_forecast(err: ForecastError) -> Self {
        match err {
            e @ ForecastError::UnknownSeries(_) => ApiError::NotFound(e.to_string()),
            e @ ForecastError::InvalidInput(_) => ApiError::InvalidRequest(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::DataSource(SourceError::MissingColumn(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "missing_columns")
            }
            ApiError::DataSource(_) => (StatusCode::BAD_GATEWAY, "data_source_error"),
            ApiError::EmptyPartition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "empty_partition"),
            ApiError::Training(_) => (StatusCode::INTERNAL_SERVER_ERROR, "training_failed"),
            ApiError::ModelNotTrained => (StatusCode::BAD_REQUEST, "model_not_trained"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::ModelStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "model_store_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        json_error(status, code, self.to_string())
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_core::{MaterialId, YearMonth};

    #[test]
    fn error_table_matches_status_codes() {
        let cases = [
            (ApiError::DataSource(SourceError::Query("x".into())), 502, "data_source_error"),
            (ApiError::DataSource(SourceError::MissingColumn("RealUsage".into())), 500, "missing_columns"),
            (ApiError::ModelNotTrained, 400, "model_not_trained"),
            (ApiError::NotFound("m".into()), 404, "not_found"),
            (ApiError::InvalidRequest("h".into()), 400, "invalid_request"),
        ];
        for (err, status, code) in cases {
            let (s, c) = err.status_and_code();
            assert_eq!(s.as_u16(), status);
            assert_eq!(c, code);
        }
    }

    #[test]
    fn forecast_errors_are_classified_by_phase() {
        let empty = ForecastError::EmptyPartition {
            cutoff: YearMonth::new(2024, 1).unwrap(),
            training_rows: 0,
            validation_rows: 3,
        };
        assert_eq!(ApiError::from_training(empty).status_and_code().1, "empty_partition");

        let fit = ForecastError::fit("random_forest", "bad").during_training();
        assert_eq!(ApiError::from_training(fit).status_and_code().1, "training_failed");

        let unknown = ForecastError::UnknownSeries(MaterialId::new(5));
        assert_eq!(ApiError::from_forecast(unknown).status_and_code().1, "not_found");
    }
}
