// src/api/handlers.rs

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{types::*, ApiState};
use crate::core::ControllerError;

type ChatResult = (StatusCode, Json<ChatReply>);

fn reply(status: StatusCode, text: impl Into<String>) -> ChatResult {
    (status, Json(ChatReply::new(text)))
}

/// POST /api/chat: Run one message through the correction controller.
pub async fn chat(
    State(state): State<ApiState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ChatResult {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!("Rejected chat body: {rejection}");
            return reply(StatusCode::BAD_REQUEST, INVALID_BODY_REPLY);
        }
    };

    let Some(username) = body.username.filter(|u| !u.trim().is_empty()) else {
        return reply(StatusCode::BAD_REQUEST, INVALID_USERNAME_REPLY);
    };
    let Some(message) = body.message.filter(|m| !m.trim().is_empty()) else {
        return reply(StatusCode::BAD_REQUEST, MISSING_MESSAGE_REPLY);
    };

    match state
        .controller
        .handle(&username, body.session_id.as_deref(), &message)
        .await
    {
        Ok(exchange) => reply(StatusCode::OK, exchange.into_reply()),
        Err(ControllerError::InvalidInput(msg)) => {
            tracing::debug!("Invalid chat request: {msg}");
            reply(StatusCode::BAD_REQUEST, INVALID_USERNAME_REPLY)
        }
        Err(e) => {
            tracing::error!("Chat request failed: {e}");
            reply(StatusCode::INTERNAL_SERVER_ERROR, APOLOGY_REPLY)
        }
    }
}

/// GET /health: Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HEALTH_STATUS.into(),
    })
}
