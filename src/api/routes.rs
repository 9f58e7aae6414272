//! Router configuration for the command listener.

use axum::{Router, middleware};

use crate::api::handlers;
use crate::api::middleware::{logging_middleware, request_id_middleware};
use crate::state::AppState;

/// Creates the listener router.
///
/// # Routes
/// - `POST /commands` - chat commands
/// - `GET /health` - liveness
///
/// Middleware is applied in reverse order of declaration, so the request id
/// is set before the logging middleware reads it.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::commands::command_routes())
        .merge(handlers::health::health_routes())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
