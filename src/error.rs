use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::bounds::BoundsError;
use crate::provider::FetchError;
use crate::service::ServiceError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid bounding box: {0}")]
    InvalidBounds(#[from] BoundsError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Station {0} not found")]
    NotFound(String),

    #[error("Station map unavailable")]
    Unavailable,

    #[error("AQI provider request failed: {0}")]
    Upstream(#[from] FetchError),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidBounds(e) => AppError::InvalidBounds(e),
            ServiceError::Stopped | ServiceError::Index(_) => AppError::Unavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidBounds { .. } | AppError::InvalidParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
