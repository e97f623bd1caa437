use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::generation::ValidationError;
use crate::models::job::JobStatus;
use crate::services::generator::GenerationError;
use crate::services::storage::StorageError;

/// JSON body shared by every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: JobStatus,
    pub code: String,
}

/// Errors surfaced by the HTTP handlers, each with a fixed status and code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid JSON in request body")]
    InvalidJson,

    #[error("Image generation service not properly configured")]
    ServiceUnavailable,

    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Image generation service configuration error")]
    ServiceError,

    #[error("{0}")]
    Generation(String),

    /// Detail is logged where the error occurs and never sent to callers.
    #[error("Internal server error")]
    Internal,

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Failed to delete image: {0}")]
    Delete(String),

    #[error("{message}")]
    Http { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidJson | ApiError::Generation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceError | ApiError::Internal | ApiError::Delete(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Http { status, .. } => *status,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidJson => "INVALID_JSON",
            ApiError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::ServiceError => "SERVICE_ERROR",
            ApiError::Generation(_) => "GENERATION_ERROR",
            ApiError::Internal => "INTERNAL_ERROR",
            ApiError::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            ApiError::Delete(_) => "DELETE_ERROR",
            ApiError::Http { .. } => "HTTP_ERROR",
        }
    }

    /// Error for an unmatched route or method, using the status reason phrase.
    pub fn http(status: StatusCode) -> Self {
        ApiError::Http {
            status,
            message: status.canonical_reason().unwrap_or("HTTP error").to_string(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match &err {
            GenerationError::RateLimited { retry_after, .. } => ApiError::RateLimited {
                message: err.to_string(),
                retry_after: *retry_after,
            },
            GenerationError::InvalidApiKey(_) => ApiError::ServiceError,
            _ => ApiError::Generation(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ApiError::ImageNotFound(id),
            StorageError::Delete(e) => ApiError::Delete(e.to_string()),
            other => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        };

        let body = ErrorBody {
            error: self.to_string(),
            status: JobStatus::Failed,
            code: self.code().to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
