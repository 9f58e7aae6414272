//! Incoming chat commands.

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    routing::post,
};

use crate::api::dto::CommandPayload;
use crate::commands::CommandRequest;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn command_routes() -> Router<AppState> {
    Router::new().route("/commands", post(receive_command))
}

/// Accepts a command and dispatches it on its own task.
///
/// The chat platform only waits a few seconds for an answer, so the
/// response is sent before the command runs; everything the command has to
/// say is posted back through the chat transport.
///
/// # Responses
/// - `200 OK` - command accepted
/// - `400 Bad Request` - body could not be decoded
/// - `401 Unauthorized` - verification token mismatch
/// - `403 Forbidden` - the operator is shutting down
pub async fn receive_command(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<StatusCode> {
    let payload = decode_payload(request).await?;

    if !state.accepts_token(&payload.token) {
        tracing::warn!(user = %payload.user_id, "Rejected command with invalid verification token");
        return Err(AppError::Unauthorized {
            message: "Invalid verification token".to_string(),
        });
    }

    if state.cancel.is_cancelled() {
        return Err(AppError::Forbidden {
            message: "The operator is shutting down".to_string(),
        });
    }

    let command = CommandRequest::from(payload);
    let dispatcher = state.dispatcher.clone();
    state.commands.spawn(async move {
        let outcome = dispatcher.handle(&command).await;
        tracing::debug!(user = %command.user, ?outcome, "Command handled");
    });

    Ok(StatusCode::OK)
}

async fn decode_payload(request: Request) -> AppResult<CommandPayload> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));

    if is_json {
        Json::<CommandPayload>::from_request(request, &())
            .await
            .map(|Json(payload)| payload)
            .map_err(|rejection| AppError::Validation {
                field: "body".to_string(),
                reason: rejection.body_text(),
            })
    } else {
        Form::<CommandPayload>::from_request(request, &())
            .await
            .map(|Form(payload)| payload)
            .map_err(|rejection| AppError::Validation {
                field: "body".to_string(),
                reason: rejection.body_text(),
            })
    }
}
