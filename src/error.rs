use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    /// The time-series store could not be reached or refused the query.
    #[error("Data source unavailable: {0}")]
    DataSource(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled before the data source answered")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failure came from the store rather than from the caller.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AppError::DataSource(_) | AppError::Http(_))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::DataSource(ref msg) => {
                tracing::error!("Data source error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Data source unavailable".to_string(),
                )
            }
            AppError::Http(ref e) => {
                tracing::error!("HTTP error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Data source unavailable".to_string(),
                )
            }
            AppError::Cancelled => {
                tracing::warn!("Request deadline exceeded");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Data source did not answer in time".to_string(),
                )
            }
            ref other => {
                tracing::error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
