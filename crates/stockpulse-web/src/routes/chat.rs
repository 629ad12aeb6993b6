//! `POST /api/chat`: one-shot chat with the language model.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: String,
}

pub async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid("body", rejection.body_text()))?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::MissingParameter("message"));
    }

    info!(chars = message.chars().count(), "forwarding chat message");
    let reply = state.analysis.chat(message).await.map_err(ApiError::Chat)?;
    Ok(Json(ChatReply { message: reply }))
}
