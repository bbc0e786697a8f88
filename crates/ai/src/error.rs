use thiserror::Error;

use stockcast_core::{MaterialId, YearMonth};

/// Errors raised while fitting or querying forecasting models.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "training or validation data is empty for cutoff {cutoff} \
         (training rows: {training_rows}, validation rows: {validation_rows}); \
         check the date range or the amount of data available"
    )]
    EmptyPartition {
        cutoff: YearMonth,
        training_rows: usize,
        validation_rows: usize,
    },

    #[error("{model} failed to fit: {reason}")]
    Fit { model: String, reason: String },

    #[error("error training the model: {0}")]
    Training(#[source] Box<ForecastError>),

    #[error("no trained history for material {0}")]
    UnknownSeries(MaterialId),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl ForecastError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn fit(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fit {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Add training context to a lower-level fitting error.
    pub fn during_training(self) -> Self {
        match self {
            e @ ForecastError::Training(_) => e,
            e => ForecastError::Training(Box::new(e)),
        }
    }
}
