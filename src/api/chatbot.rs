use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::{AppState, blocking};
use crate::services::chatbot::{ChatOutcome, ChatTurn, NOT_CONFIGURED};

pub const MISSING_MESSAGE: &str = "message is required";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    pub message: Option<String>,
}

/// Chat replies are bare `{text}` objects, not enveloped.
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub text: String,
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(MISSING_MESSAGE.to_string()))?;
    let history = request.history;

    let (store, bridge) = (state.store.clone(), state.chat.clone());
    let outcome = blocking(move || Ok(bridge.respond(store.as_ref(), &history, &message))).await?;

    match outcome {
        ChatOutcome::NotConfigured => Ok((
            StatusCode::BAD_REQUEST,
            Json(ChatReply {
                text: NOT_CONFIGURED.to_string(),
            }),
        )
            .into_response()),
        ChatOutcome::DataUnavailable(reason) => Err(ApiError::Unavailable(format!("data unavailable: {}", reason))),
        ChatOutcome::Reply(text) | ChatOutcome::Fallback(text) => Ok(Json(ChatReply { text }).into_response()),
    }
}
