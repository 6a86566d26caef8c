//! JSON error bodies shared by the router and the handlers

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Handler error type
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: String, request_id: Option<Uuid>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message,
            request_id: request_id.map(|id| id.to_string()),
        }),
    )
}

pub fn bad_request(message: String, request_id: Option<Uuid>) -> ApiError {
    error(StatusCode::BAD_REQUEST, message, request_id)
}

pub fn not_found(message: String, request_id: Option<Uuid>) -> ApiError {
    error(StatusCode::NOT_FOUND, message, request_id)
}

pub fn conflict(message: String, request_id: Option<Uuid>) -> ApiError {
    error(StatusCode::CONFLICT, message, request_id)
}

pub fn service_unavailable(message: String, request_id: Option<Uuid>) -> ApiError {
    error(StatusCode::SERVICE_UNAVAILABLE, message, request_id)
}

/// Internal errors keep their detail in the logs, not in the response.
pub fn internal_error(message: String, request_id: Option<Uuid>) -> ApiError {
    tracing::error!(request_id = ?request_id, error = %message, "Internal error");
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error. Please contact support with the request ID.".to_string(),
        request_id,
    )
}
