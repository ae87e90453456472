//! Contact-form inbox: one JSON object per line in a local append-only file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::emission::ValidationError;

pub const MISSING_CONTACT_FIELDS: &str = "Missing required fields";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ContactInput {
    pub fn into_message(self, now: DateTime<Utc>) -> Result<ContactMessage, ValidationError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(name), Some(email), Some(message)) = (present(self.name), present(self.email), present(self.message))
        else {
            return Err(ValidationError(MISSING_CONTACT_FIELDS.to_string()));
        };
        Ok(ContactMessage {
            id: now.timestamp_millis(),
            name,
            email,
            subject: self.subject.unwrap_or_default(),
            message,
            created_at: now,
        })
    }
}

pub struct ContactInbox {
    path: PathBuf,
    // serializes appends from concurrent requests
    write_lock: Mutex<()>,
}

impl ContactInbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ContactInbox {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ContactMessage) -> Result<(), String> {
        let mut line = serde_json::to_string(entry).map_err(|e| format!("encode contact failed: {}", e))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| "contact inbox lock poisoned".to_string())?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("failed to open {}: {}", self.path.display(), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| format!("failed to write {}: {}", self.path.display(), e))
    }
}
