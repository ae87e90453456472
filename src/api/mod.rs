//! HTTP surface of the dashboard backend.
//!
//! Handlers stay thin: they parse input, hand the blocking store or AI work to
//! tokio's blocking pool and wrap results in the `{success, data}` envelope.
//! Failures are rendered by [`error::ApiError`] as `{error}`.

pub mod error;

mod chatbot;
mod contact;
mod departments;
mod emissions;
mod insights;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::emission::Category;
use crate::services::chatbot::ChatBridge;
use crate::services::contact::ContactInbox;
use crate::store::{ALL_SENTINEL, EmissionFilter, Store};
use crate::utils::parse_iso_date;
use error::{ApiError, ENDPOINT_NOT_FOUND};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub chat: Arc<ChatBridge>,
    pub contacts: Arc<ContactInbox>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/emissions", get(emissions::list).post(emissions::create))
        .route("/api/emissions/bulk", post(emissions::bulk_import))
        .route("/api/emissions/:id", put(emissions::update).delete(emissions::remove))
        .route("/api/departments", get(departments::list).post(departments::create))
        .route("/api/analytics/summary", get(insights::summary))
        .route("/api/analytics/trends", get(insights::trends))
        .route("/api/recommendations", get(insights::recommendations))
        .route("/api/emission-factors", get(insights::emission_factors))
        .route("/api/chatbot", post(chatbot::chat))
        .route("/api/contact", post(contact::submit))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, data })
}

/// Run synchronous store or network work off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {}", e)))?
}

/// Shared query parameters for record listings. Blank values and `all` leave a field unconstrained.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub department: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn date_param(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_iso_date(s).map(Some).map_err(ApiError::Validation),
        None => Ok(None),
    }
}

impl FilterParams {
    pub fn to_filter(&self) -> Result<EmissionFilter, ApiError> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") | Some(ALL_SENTINEL) => None,
            Some(raw) => Some(
                Category::parse(raw).ok_or_else(|| ApiError::Validation(format!("unknown category '{}'", raw)))?,
            ),
        };
        Ok(EmissionFilter {
            department: EmissionFilter::department_param(self.department.as_deref()),
            category,
            start: date_param(self.start_date.as_deref())?,
            end: date_param(self.end_date.as_deref())?,
        })
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match blocking(move || Ok(store.ping()?)).await {
        Ok(()) => Json(Health {
            status: "ok",
            error: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health {
                status: "unavailable",
                error: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound(ENDPOINT_NOT_FOUND.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GeminiClientError, TextGenerator};
    use crate::db::memory::MemoryStore;
    use crate::models::gemini::Content;
    use crate::services::chatbot::NOT_CONFIGURED;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct Offline;

    impl TextGenerator for Offline {
        fn generate(&self, _: &[Content]) -> Result<String, GeminiClientError> {
            Err(GeminiClientError::Transport("dns error".into()))
        }
    }

    fn app_with(chat: ChatBridge) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let contacts = std::env::temp_dir().join(format!("api-contacts-{}.jsonl", uuid::Uuid::new_v4()));
        let state = AppState {
            store: store.clone(),
            chat: Arc::new(chat),
            contacts: Arc::new(ContactInbox::new(contacts)),
        };
        (router(state), store)
    }

    fn app() -> (Router, Arc<MemoryStore>) {
        app_with(ChatBridge::new(None))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn grid(date: &str, value: f64, department: &str) -> Value {
        json!({
            "date": date,
            "category": "electricity",
            "subcategory": "grid",
            "value": value,
            "department": department,
        })
    }

    #[tokio::test]
    async fn create_derives_co2_and_returns_201() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::POST, "/api/emissions", Some(grid("2024-01-15", 1000.0, "ops"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["unit"], "kWh");
        assert_eq!(data["co2Lbs"].as_f64(), Some(920.0));
        assert_eq!(data["co2Kg"].as_f64(), Some(417.3));
        assert_eq!(data["emissionFactor"].as_f64(), Some(0.92));
        assert_eq!(data["notes"], "");
        assert!(data.get("updatedAt").is_none());
    }

    #[tokio::test]
    async fn create_reports_missing_fields() {
        let (app, store) = app();
        let (status, body) = send(&app, Method::POST, "/api/emissions", Some(json!({"date": "2024-01-01"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Missing required fields: date, category, subcategory, value, department"
        );
        assert!(store.list_emissions(&EmissionFilter::default()).unwrap().is_empty());

        let mut bad = grid("2024-01-01", 1.0, "ops");
        bad["category"] = json!("aviation");
        let (status, _) = send(&app, Method::POST, "/api/emissions", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_applies_every_filter() {
        let (app, _) = app();
        for (date, dept) in [("2024-01-10", "ops"), ("2024-02-10", "ops"), ("2024-03-10", "it")] {
            send(&app, Method::POST, "/api/emissions", Some(grid(date, 10.0, dept))).await;
        }
        let mut waste = grid("2024-02-20", 1.0, "ops");
        waste["category"] = json!("waste");
        waste["subcategory"] = json!("landfill");
        send(&app, Method::POST, "/api/emissions", Some(waste)).await;

        let (status, body) = send(&app, Method::GET, "/api/emissions?department=all&category=all", None).await;
        assert_eq!(status, StatusCode::OK);
        let dates: Vec<&str> = body["data"].as_array().unwrap().iter().map(|r| r["date"].as_str().unwrap()).collect();
        assert_eq!(dates, ["2024-03-10", "2024-02-20", "2024-02-10", "2024-01-10"]);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/emissions?department=ops&category=electricity&startDate=2024-02-01&endDate=2024-02-10",
            None,
        )
        .await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["date"], "2024-02-10");

        let (status, _) = send(&app, Method::GET, "/api/emissions?startDate=02/01/2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_import_is_all_or_nothing() {
        let (app, store) = app();
        let (status, body) = send(&app, Method::POST, "/api/emissions/bulk", Some(json!({"emissions": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "emissions array is required and must not be empty");

        for body in [json!({}), json!({"emissions": "nope"}), json!({"emissions": {"date": "2024-01-01"}})] {
            let (status, body) = send(&app, Method::POST, "/api/emissions/bulk", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "emissions array is required and must not be empty");
        }

        let batch = json!({"emissions": [grid("2024-01-01", 1.0, "ops"), "not an object"]});
        let (status, body) = send(&app, Method::POST, "/api/emissions/bulk", Some(batch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("emissions[1]: "));

        let batch = json!({"emissions": [grid("2024-01-01", 1.0, "ops"), {"date": "2024-01-02"}]});
        let (status, body) = send(&app, Method::POST, "/api/emissions/bulk", Some(batch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("emissions[1]: Missing required fields"));
        assert!(store.list_emissions(&EmissionFilter::default()).unwrap().is_empty());

        let mut from_csv = grid("2024-01-02", 0.0, "it");
        from_csv["value"] = json!("2.5");
        let batch = json!({"emissions": [grid("2024-01-01", 1.0, "ops"), from_csv]});
        let (status, body) = send(&app, Method::POST, "/api/emissions/bulk", Some(batch)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["imported"], 2);
        assert_eq!(store.list_emissions(&EmissionFilter::default()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_is_partial_and_missing_ids_are_404() {
        let (app, _) = app();
        let (_, created) = send(&app, Method::POST, "/api/emissions", Some(grid("2024-01-15", 1000.0, "ops"))).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::PUT, &format!("/api/emissions/{id}"), Some(json!({"notes": "x"}))).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["notes"], "x");
        assert_eq!(data["co2Lbs"].as_f64(), Some(920.0));
        assert_eq!(data["value"].as_f64(), Some(1000.0));
        assert!(data["updatedAt"].is_string());

        let (_, body) = send(&app, Method::PUT, &format!("/api/emissions/{id}"), Some(json!({"value": 10}))).await;
        assert_eq!(body["data"]["co2Lbs"].as_f64(), Some(9.2));

        let (status, body) = send(&app, Method::PUT, "/api/emissions/nope", Some(json!({"notes": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Emission record not found");
    }

    #[tokio::test]
    async fn delete_removes_once() {
        let (app, _) = app();
        let (_, created) = send(&app, Method::POST, "/api/emissions", Some(grid("2024-01-15", 1.0, "ops"))).await;
        let uri = format!("/api/emissions/{}", created["data"]["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "message": "Emission record deleted"}));

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Emission record not found");
    }

    #[tokio::test]
    async fn departments_require_a_name() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::POST, "/api/departments", Some(json!({"description": "d"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Department name is required");

        let (status, body) = send(&app, Method::POST, "/api/departments", Some(json!({"name": "Facilities"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["description"], "");

        let (_, body) = send(&app, Method::GET, "/api/departments", None).await;
        assert_eq!(body["data"][0]["name"], "Facilities");
    }

    #[tokio::test]
    async fn analytics_and_recommendations_reflect_stored_data() {
        let (app, _) = app();
        send(&app, Method::POST, "/api/emissions", Some(grid("2024-01-15", 1000.0, "ops"))).await;
        send(&app, Method::POST, "/api/emissions", Some(grid("2024-02-15", 1000.0, "it"))).await;

        let (status, body) = send(&app, Method::GET, "/api/analytics/summary?department=ops", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalEmissions"].as_f64(), Some(417.3));
        assert_eq!(body["data"]["totalRecords"], 1);
        assert_eq!(body["data"]["monthlyData"]["2024-01"].as_f64(), Some(417.3));

        let (_, body) = send(&app, Method::GET, "/api/analytics/trends?months=1", None).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["month"], "2024-02");

        let (status, _) = send(&app, Method::GET, "/api/analytics/trends?months=soon", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, Method::GET, "/api/recommendations", None).await;
        let recs = body["data"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["category"], "electricity");
        assert_eq!(recs[1]["category"], "general");
    }

    #[tokio::test]
    async fn factor_table_is_served() {
        let (app, _) = app();
        let (_, body) = send(&app, Method::GET, "/api/emission-factors", None).await;
        assert_eq!(body["data"]["electricity"]["grid"]["factor"].as_f64(), Some(0.92));
        assert_eq!(body["data"]["waste"]["landfill"]["unit"], "ton");
    }

    #[tokio::test]
    async fn chatbot_without_key_is_400_with_text() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::POST, "/api/chatbot", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["text"], NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn chatbot_failure_degrades_to_echo() {
        let (app, _) = app_with(ChatBridge::new(Some(Arc::new(Offline))));
        let body = json!({"history": [{"role": "user", "parts": "earlier"}], "message": "how are we doing?"});
        let (status, body) = send(&app, Method::POST, "/api/chatbot", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["text"],
            "AI unavailable: transport error: dns error. Fallback echo: how are we doing?"
        );
    }

    #[tokio::test]
    async fn contact_validates_then_acknowledges() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::POST, "/api/contact", Some(json!({"name": "Ada"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");

        let msg = json!({"name": "Ada", "email": "ada@example.com", "message": "hello"});
        let (status, body) = send(&app, Method::POST, "/api/contact", Some(msg)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "data": {"received": true}}));
    }

    #[tokio::test]
    async fn health_and_unknown_routes() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, Method::GET, "/api/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Endpoint not found");
    }
}
