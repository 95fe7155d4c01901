//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use storegate_core::GatewayError;

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// Failure from the gateway, mapped by its kind
    Gateway(GatewayError),
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Gateway(err) => {
                let kind = err.kind();
                let status = StatusCode::from_u16(kind.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, kind.as_str(), err.to_string())
            }
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else if status.is_client_error() {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_keep_their_status() {
        let cases = [
            (GatewayError::no_backends("abc"), StatusCode::SERVICE_UNAVAILABLE),
            (GatewayError::not_found("a", 1), StatusCode::NOT_FOUND),
            (
                GatewayError::backend(1, "put object", "boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                GatewayError::discovery("list containers", "refused"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GatewayError::Cancelled("deadline exceeded".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn bad_request_is_400() {
        let resp = ApiError::BadRequest("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
