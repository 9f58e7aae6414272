//! Conversion of [`AppError`] into HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    /// Maps each variant to a status code and an [`ErrorResponse`].
    ///
    /// Sources of remote, configuration and internal errors are logged but
    /// never sent to the caller.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound { entity, field, value } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", &format!("{} not found", entity))
                    .with_details(json!({ "field": field, "value": value })),
            ),
            AppError::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", reason)
                    .with_details(json!({ "field": field })),
            ),
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("UNAUTHORIZED", message),
            ),
            AppError::Forbidden { message } => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("FORBIDDEN", message),
            ),
            AppError::Conflict { message } => (
                StatusCode::CONFLICT,
                ErrorResponse::new("CONFLICT", message),
            ),
            AppError::Remote { operation, .. } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("REMOTE_ERROR", "A remote service call failed")
                    .with_details(json!({ "operation": operation })),
            ),
            AppError::Configuration { key, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("CONFIGURATION_ERROR", &format!("Configuration error: {}", key)),
            ),
            AppError::Internal { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::Unauthorized { message: "nope".into() },
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Validation { field: "body".into(), reason: "bad".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::remote("get_bug", anyhow::anyhow!("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Internal { source: anyhow::anyhow!("boom") },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
