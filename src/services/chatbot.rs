//! Chat bridge: embeds recent store data in a prompt and asks the text generator for a summary.
//!
//! Generator failures never surface as errors; the caller gets an echo of its
//! message with the failure reason instead.

use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

use crate::client::TextGenerator;
use crate::models::emission::{Department, EmissionRecord};
use crate::models::gemini::{Content, Part};
use crate::store::{Store, StoreError};

/// Records fetched from the store as chat context, newest insert first.
pub const CONTEXT_FETCH_LIMIT: usize = 200;
/// Records of the fetched window embedded in the prompt (taken from its tail).
pub const PROMPT_RECORD_LIMIT: usize = 20;

pub const NOT_CONFIGURED: &str = "Generative AI not configured. Set GEMINI_API_KEY in .env.";

const PREAMBLE: &str = "You are a carbon footprint analyst. Your role is to provide feedback and recommendations based on the user's data.\n\
Please provide a summary of the user's carbon footprint data in 100 words or less, formatted as a list of points.\n\
Here is the data for the company:";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TurnParts {
    Text(String),
    Parts(Vec<Part>),
}

/// One prior message as sent by the dashboard (`parts` may be a plain string).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(alias = "content")]
    pub parts: TurnParts,
}

impl ChatTurn {
    fn to_content(&self) -> Content {
        let role = match self.role.as_str() {
            "assistant" | "model" => "model",
            _ => "user",
        };
        let parts = match &self.parts {
            TurnParts::Text(t) => vec![Part { text: Some(t.clone()) }],
            TurnParts::Parts(p) => p.clone(),
        };
        Content {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    NotConfigured,
    DataUnavailable(String),
    Reply(String),
    Fallback(String),
}

pub fn fallback_text(reason: &str, message: &str) -> String {
    format!("AI unavailable: {}. Fallback echo: {}", reason, message)
}

pub fn build_prompt(departments: &[Department], recent: &[EmissionRecord], message: &str) -> String {
    let tail = &recent[recent.len().saturating_sub(PROMPT_RECORD_LIMIT)..];
    let departments_json = serde_json::to_string_pretty(departments).unwrap_or_else(|_| "[]".to_string());
    let emissions_json = serde_json::to_string_pretty(tail).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{PREAMBLE}\nDepartments: {departments_json}\nEmissions: {emissions_json}\n\nUser message: {message}"
    )
}

fn load_context(store: &dyn Store) -> Result<(Vec<Department>, Vec<EmissionRecord>), StoreError> {
    store.ping()?;
    Ok((store.list_departments()?, store.recent_emissions(CONTEXT_FETCH_LIMIT)?))
}

pub struct ChatBridge {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ChatBridge {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        ChatBridge { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn respond(&self, store: &dyn Store, history: &[ChatTurn], message: &str) -> ChatOutcome {
        let Some(generator) = self.generator.as_ref() else {
            return ChatOutcome::NotConfigured;
        };

        let (departments, recent) = match load_context(store) {
            Ok(c) => c,
            Err(e) => return ChatOutcome::DataUnavailable(e.to_string()),
        };
        debug!(
            "chatbot: {} department(s), {} recent record(s), {} history turn(s)",
            departments.len(),
            recent.len(),
            history.len()
        );

        let mut contents: Vec<Content> = history.iter().map(ChatTurn::to_content).collect();
        contents.push(Content::text("user", build_prompt(&departments, &recent, message)));

        match generator.generate(&contents) {
            Ok(text) => ChatOutcome::Reply(text),
            Err(e) => {
                warn!("Generative AI call failed: {}", e);
                ChatOutcome::Fallback(fallback_text(&e.to_string(), message))
            }
        }
    }
}
