use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use super::error::ApiError;
use super::{AppState, Envelope, blocking, ok};
use crate::services::contact::ContactInput;

#[derive(Debug, Serialize)]
pub struct Received {
    pub received: bool,
}

/// Validates and acknowledges; a failed write is logged but never reported to the sender.
pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<ContactInput>, JsonRejection>,
) -> Result<Json<Envelope<Received>>, ApiError> {
    let Json(input) = payload?;
    let message = input.into_message(Utc::now())?;
    let inbox = state.contacts.clone();
    let written = blocking(move || Ok(inbox.append(&message).map(|_| message.id))).await?;
    match written {
        Ok(id) => info!("contact message {} stored in {}", id, state.contacts.path().display()),
        Err(e) => warn!("contact message not stored: {}", e),
    }
    Ok(ok(Received { received: true }))
}
