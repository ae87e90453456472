use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;

use super::error::ApiError;
use super::{AppState, Envelope, blocking, ok};
use crate::models::emission::{Department, DepartmentInput};

pub async fn list(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Department>>>, ApiError> {
    let store = state.store.clone();
    let departments = blocking(move || Ok(store.list_departments()?)).await?;
    Ok(ok(departments))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<DepartmentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Department>>), ApiError> {
    let Json(input) = payload?;
    let department = input.into_department(Utc::now())?;
    let store = state.store.clone();
    let department = blocking(move || {
        store.insert_department(&department)?;
        Ok(department)
    })
    .await?;
    Ok((StatusCode::CREATED, ok(department)))
}
