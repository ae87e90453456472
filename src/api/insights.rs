//! Read-only views derived from the stored records.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use chrono::Utc;
use serde::Deserialize;

use super::error::ApiError;
use super::{AppState, Envelope, FilterParams, blocking, ok};
use crate::factors::FactorTable;
use crate::services::analytics::{self, AnalyticsSummary, DEFAULT_TREND_MONTHS, TrendRow};
use crate::services::recommendations::{self, Recommendation};
use crate::store::EmissionFilter;

/// Summary honours department and date range; category is not a summary dimension.
pub async fn summary(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Envelope<AnalyticsSummary>>, ApiError> {
    let Query(params) = params?;
    let filter = EmissionFilter {
        category: None,
        ..params.to_filter()?
    };
    let today = Utc::now().date_naive();
    let store = state.store.clone();
    let summary = blocking(move || Ok(analytics::summarize(store.as_ref(), &filter, today)?)).await?;
    Ok(ok(summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendParams {
    pub department: Option<String>,
    pub months: Option<String>,
}

fn months_param(raw: Option<&str>) -> Result<usize, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_TREND_MONTHS),
        Some(s) => s
            .parse::<usize>()
            .map_err(|_| ApiError::Validation(format!("months must be a non-negative integer, got '{}'", s))),
    }
}

pub async fn trends(
    State(state): State<AppState>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<TrendRow>>>, ApiError> {
    let Query(params) = params?;
    let months = months_param(params.months.as_deref())?;
    let filter = EmissionFilter::for_department(EmissionFilter::department_param(params.department.as_deref()));
    let store = state.store.clone();
    let records = blocking(move || Ok(store.list_emissions(&filter)?)).await?;
    Ok(ok(analytics::trends(&records, months)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentParams {
    pub department: Option<String>,
}

pub async fn recommendations(
    State(state): State<AppState>,
    params: Result<Query<DepartmentParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Recommendation>>>, ApiError> {
    let Query(params) = params?;
    let filter = EmissionFilter::for_department(EmissionFilter::department_param(params.department.as_deref()));
    let store = state.store.clone();
    let records = blocking(move || Ok(store.list_emissions(&filter)?)).await?;
    Ok(ok(recommendations::recommend(&records)))
}

pub async fn emission_factors() -> Json<Envelope<FactorTable>> {
    ok(FactorTable)
}
