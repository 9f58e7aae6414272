//! Health check endpoint.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::api::dto::{HealthResponse, HealthStatus};
use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// `200` while running, `503` once shutdown has begun.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.cancel.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::ShuttingDown)
    } else {
        (StatusCode::OK, HealthStatus::Healthy)
    };

    let response = HealthResponse {
        status,
        version: crate::pkg_version().to_string(),
        timestamp: jiff::Timestamp::now(),
    };
    (code, Json(response))
}
