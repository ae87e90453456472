use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use super::{AppState, Envelope, FilterParams, blocking, ok};
use crate::models::emission::{EmissionInput, EmissionPatch, EmissionRecord};

pub const EMPTY_BULK: &str = "emissions array is required and must not be empty";

pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<EmissionRecord>>>, ApiError> {
    let Query(params) = params?;
    let filter = params.to_filter()?;
    let store = state.store.clone();
    let records = blocking(move || Ok(store.list_emissions(&filter)?)).await?;
    Ok(ok(records))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<EmissionInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<EmissionRecord>>), ApiError> {
    let Json(input) = payload?;
    let record = input.into_record(Utc::now())?;
    let store = state.store.clone();
    let record = blocking(move || {
        store.insert_emission(&record)?;
        Ok(record)
    })
    .await?;
    debug!("created emission {} ({} {})", record.id, record.category, record.subcategory);
    Ok((StatusCode::CREATED, ok(record)))
}

/// `emissions` stays untyped until checked so a missing or non-array value gets [`EMPTY_BULK`].
#[derive(Debug, Default, Deserialize)]
pub struct BulkImport {
    #[serde(default)]
    pub emissions: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub imported: usize,
}

pub async fn bulk_import(
    State(state): State<AppState>,
    payload: Result<Json<BulkImport>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<BulkResult>>), ApiError> {
    let Json(body) = payload?;
    let items = match body.emissions {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(ApiError::Validation(EMPTY_BULK.to_string())),
    };

    // one bad item rejects the whole batch
    let now = Utc::now();
    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| -> Result<EmissionRecord, ApiError> {
            let input: EmissionInput = serde_json::from_value(item)
                .map_err(|e| ApiError::Validation(format!("emissions[{}]: {}", i, e)))?;
            input
                .into_record(now)
                .map_err(|e| ApiError::Validation(format!("emissions[{}]: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let store = state.store.clone();
    let imported = blocking(move || Ok(store.insert_emissions(&records)?)).await?;
    debug!("bulk import stored {} emission(s)", imported);
    Ok((StatusCode::CREATED, ok(BulkResult { imported })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EmissionPatch>, JsonRejection>,
) -> Result<Json<Envelope<EmissionRecord>>, ApiError> {
    let Json(patch) = payload?;
    let update = patch.validate()?;
    let store = state.store.clone();
    let record = blocking(move || Ok(store.update_emission(&id, &update, Utc::now())?)).await?;
    Ok(ok(record))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub success: bool,
    pub message: &'static str,
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Deleted>, ApiError> {
    let store = state.store.clone();
    blocking(move || Ok(store.delete_emission(&id)?)).await?;
    Ok(Json(Deleted {
        success: true,
        message: "Emission record deleted",
    }))
}
