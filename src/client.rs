//! Minimal HTTP client for the Gemini `generateContent` endpoint.
//!
//! - Blocking client using `ureq` (no async); callers run it on a blocking thread.
//! - Uses the wire types in `crate::models::gemini`.
//! - Single attempt per call, bounded by the agent-wide timeout. No retries.

use http::header::ACCEPT;
use std::time::Duration;

use crate::models::gemini::{Content, GenerateContentRequest, GenerateContentResponse};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub enum GeminiClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json(String),
    EmptyResponse(Option<String>),
}

impl core::fmt::Display for GeminiClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GeminiClientError::Transport(s) => write!(f, "transport error: {}", s),
            GeminiClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            GeminiClientError::Json(e) => write!(f, "json error: {}", e),
            GeminiClientError::EmptyResponse(Some(reason)) => write!(f, "no text returned (blocked: {})", reason),
            GeminiClientError::EmptyResponse(None) => write!(f, "no text returned"),
        }
    }
}

impl std::error::Error for GeminiClientError {}

impl From<ureq::Error> for GeminiClientError {
    fn from(value: ureq::Error) -> Self {
        GeminiClientError::Transport(value.to_string())
    }
}

/// Anything that turns a conversation into a single text reply.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, contents: &[Content]) -> Result<String, GeminiClientError>;
}

pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        // Non-2xx responses are handled below so the error body can be reported.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        GeminiClient {
            agent,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", BASE_URL, self.model)
    }

    fn post_generate(&self, contents: &[Content]) -> Result<GenerateContentResponse, GeminiClientError> {
        let mut res = self
            .agent
            .post(&self.url())
            .header(ACCEPT, "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send_json(GenerateContentRequest { contents })?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .body_mut()
                .read_to_string()
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(GeminiClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = res.body_mut().read_to_vec()?;
        let mut de = serde_json::Deserializer::from_slice(&bytes);
        serde_path_to_error::deserialize(&mut de).map_err(|e| GeminiClientError::Json(e.to_string()))
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, contents: &[Content]) -> Result<String, GeminiClientError> {
        let response = self.post_generate(contents)?;
        response.first_text().ok_or_else(|| {
            GeminiClientError::EmptyResponse(response.prompt_feedback.and_then(|f| f.block_reason))
        })
    }
}
