use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The field required by the request's `type` is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// The body is not JSON or does not match the request shape.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("model call failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg.clone(),
                    details: None,
                },
            ),
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: self.to_string(),
                    details: None,
                },
            ),
            ApiError::Upstream(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    details: Some(format!("{err:#}")),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
