//! Mapping of domain errors onto HTTP responses

use crate::error::{DetectorError, InferenceError, ValidationError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error body: `{"error": "<kind>", "detail": "<message>"}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub detail: String,
}

/// Request failure, split by who caused it.
#[derive(Debug)]
pub enum ApiError {
    /// Caller sent an invalid record: 400
    Validation(ValidationError),
    /// The model failed: 500
    Inference(InferenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        ApiError::Inference(err)
    }
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Validation(e) => ApiError::Validation(e),
            DetectorError::Inference(e) => ApiError::Inference(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(e) => ErrorResponse {
                error: "validation_error",
                detail: e.to_string(),
            },
            ApiError::Inference(e) => ErrorResponse {
                error: "inference_error",
                detail: e.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
