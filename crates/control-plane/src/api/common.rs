// Common DTOs for public API
//
// These types are shared across multiple API endpoints.

use axum::http::StatusCode;
use axum::Json;
use paperwatch_core::EngineError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Convert to axum response tuple
    pub fn into_response(self, status: StatusCode) -> (StatusCode, Json<Self>) {
        (status, Json(self))
    }
}

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map an engine failure to a status code. Store failures are logged and
/// reported without detail.
pub fn engine_error(context: &str, err: EngineError) -> ApiError {
    match err {
        EngineError::AlertNotFound(_) | EngineError::DeviceNotFound(_) => {
            ErrorResponse::new(err.to_string()).into_response(StatusCode::NOT_FOUND)
        }
        EngineError::InvalidTelemetry(_) => {
            ErrorResponse::new(err.to_string()).into_response(StatusCode::BAD_REQUEST)
        }
        EngineError::Store(_) => {
            tracing::error!(error = %err, "{context}");
            ErrorResponse::new("Internal server error")
                .into_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
