//! Host errors as HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hookline_host::HostError;
use serde::Serialize;

/// API error that converts to an HTTP response
///
/// The body's `message` is the host error text verbatim; clients surface it
/// as the transport failure.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// 409 Conflict
    Conflict(String),
    /// 502 Bad Gateway (the bus refused the frame)
    BadGateway(String),
    /// 500 Internal Server Error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        let message = err.to_string();
        match err {
            HostError::ProviderNotFound(_) | HostError::DeviceNotFound(_) | HostError::DomainNotFound(_) => {
                ApiError::NotFound(message)
            }
            HostError::NotConnected(_) | HostError::Busy(_) => ApiError::Conflict(message),
            HostError::Bus(_) => ApiError::BadGateway(message),
            HostError::Config(_) => ApiError::Internal(message),
            HostError::InvalidRequest(_) | HostError::Rpc(_) => ApiError::BadRequest(message),
        }
    }
}
