//! Error taxonomy for the service.
//!
//! - [`ValidationError`]: the caller sent something malformed. HTTP 400.
//! - [`StoreError`]: the Reading Store failed. HTTP 500, generic detail.
//!
//! "No reading for this station" is not an error; see [`crate::latest::Latest`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Malformed or missing required input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct ValidationError {
    pub detail: String,
}

impl ValidationError {
    pub fn new(detail: impl Into<String>) -> Self {
        ValidationError {
            detail: detail.into(),
        }
    }
}

/// The Reading Store was unreachable or rejected the operation.
#[derive(Debug, Error)]
pub enum StoreError {
    // ---
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Any failure surfaced to an HTTP caller, ingestion included.
#[derive(Debug, Error)]
pub enum ApiError {
    // ---
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Error raised by the ingestion path.
pub type IngestionError = ApiError;

/// JSON body for every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    detail: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable detail safe to hand back to the caller.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Validation(e) => e.detail.clone(),
            ApiError::Storage(_) => "internal storage error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        match &self {
            ApiError::Validation(e) => tracing::debug!("Rejected request: {}", e),
            ApiError::Storage(e) => tracing::error!("Storage failure: {}", e),
        }

        let body = ErrorBody {
            status: "error",
            detail: self.detail(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
