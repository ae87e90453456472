use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

use crate::models::emission::ValidationError;
use crate::store::StoreError;

pub const EMISSION_NOT_FOUND: &str = "Emission record not found";
pub const ENDPOINT_NOT_FOUND: &str = "Endpoint not found";

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or incomplete client input (400)
    Validation(String),
    NotFound(String),
    /// A required dependency could not be reached (503)
    Unavailable(String),
    /// Store or worker failure, reported with its raw message (500)
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(m) | ApiError::NotFound(m) | ApiError::Unavailable(m) | ApiError::Internal(m) => {
                f.write_str(m)
            }
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        (self.status(), Json(ErrorBody { error: &message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => ApiError::NotFound(EMISSION_NOT_FOUND.to_string()),
            StoreError::Backend(message) => {
                error!("store failure: {}", message);
                ApiError::Internal(message)
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        ApiError::Validation(value.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::Validation(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::Validation(value.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status() {
        let e: ApiError = StoreError::NotFound("abc".into()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), EMISSION_NOT_FOUND);

        let e: ApiError = StoreError::Backend("relation \"emissions\" does not exist".into()).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("does not exist"));
    }

    #[test]
    fn validation_keeps_message() {
        let e: ApiError = ValidationError("Department name is required".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "Department name is required");
    }
}
