//! Domain records exchanged over the HTTP API and persisted by the stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::factors;
use crate::utils::{deserialize_lenient_f64, parse_iso_date, storage_timestamp};

pub const MISSING_EMISSION_FIELDS: &str = "Missing required fields: date, category, subcategory, value, department";
pub const MISSING_DEPARTMENT_NAME: &str = "Department name is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electricity,
    Transportation,
    Heating,
    Waste,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Electricity,
        Category::Transportation,
        Category::Heating,
        Category::Waste,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Electricity => "electricity",
            Category::Transportation => "transportation",
            Category::Heating => "heating",
            Category::Waste => "waste",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw.trim())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_category(raw: &str) -> Result<Category, ValidationError> {
    Category::parse(raw).ok_or_else(|| {
        ValidationError(format!(
            "unknown category '{}': expected one of electricity, transportation, heating, waste",
            raw
        ))
    })
}

/// Rejected client input; the message is returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionRecord {
    pub id: String,
    pub date: NaiveDate,
    pub category: Category,
    pub subcategory: String,
    pub value: f64,
    pub unit: String,
    pub department: String,
    pub notes: String,
    pub co2_lbs: f64,
    pub co2_kg: f64,
    pub emission_factor: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EmissionRecord {
    /// Build a fresh record, deriving CO2 fields and freezing the current factor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        category: Category,
        subcategory: String,
        value: f64,
        unit: Option<String>,
        department: String,
        notes: String,
        now: DateTime<Utc>,
    ) -> Self {
        let calc = factors::calculate(category, &subcategory, value);
        EmissionRecord {
            id: Uuid::new_v4().to_string(),
            date,
            category,
            subcategory,
            value,
            unit: unit.unwrap_or_else(|| calc.unit.to_string()),
            department,
            notes,
            co2_lbs: calc.co2_lbs,
            co2_kg: calc.co2_kg,
            emission_factor: calc.factor,
            created_at: storage_timestamp(now),
            updated_at: None,
        }
    }

    /// Apply a partial update in place. CO2 fields are recomputed only when a new value is supplied.
    pub fn apply_update(&mut self, update: &EmissionUpdate, now: DateTime<Utc>) {
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(sub) = &update.subcategory {
            self.subcategory = sub.clone();
        }
        if let Some(department) = &update.department {
            self.department = department.clone();
        }
        if let Some(notes) = &update.notes {
            self.notes = notes.clone();
        }
        if let Some(value) = update.value {
            let calc = factors::calculate(self.category, &self.subcategory, value);
            self.value = value;
            self.co2_lbs = calc.co2_lbs;
            self.co2_kg = calc.co2_kg;
            self.emission_factor = calc.factor;
            if let Some(unit) = &update.unit {
                self.unit = unit.clone();
            }
        }
        self.updated_at = Some(storage_timestamp(now));
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn validate_value(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError("value must be a non-negative number".to_string()))
    }
}

/// Request body for creating an emission record (single or bulk).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmissionInput {
    pub date: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

impl EmissionInput {
    pub fn into_record(self, now: DateTime<Utc>) -> Result<EmissionRecord, ValidationError> {
        let (Some(date), Some(category), Some(subcategory), Some(value), Some(department)) = (
            non_blank(self.date),
            non_blank(self.category),
            non_blank(self.subcategory),
            self.value,
            non_blank(self.department),
        ) else {
            return Err(ValidationError(MISSING_EMISSION_FIELDS.to_string()));
        };

        let date = parse_iso_date(&date).map_err(ValidationError)?;
        let category = parse_category(&category)?;
        let value = validate_value(value)?;

        Ok(EmissionRecord::new(
            date,
            category,
            subcategory,
            value,
            non_blank(self.unit),
            department,
            self.notes.unwrap_or_default(),
            now,
        ))
    }
}

/// Request body for a partial update; blank strings count as "not supplied" except for notes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmissionPatch {
    pub date: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

/// Validated form of [`EmissionPatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionUpdate {
    pub date: Option<NaiveDate>,
    pub category: Option<Category>,
    pub subcategory: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
}

impl EmissionPatch {
    pub fn validate(self) -> Result<EmissionUpdate, ValidationError> {
        let date = non_blank(self.date)
            .map(|d| parse_iso_date(&d).map_err(ValidationError))
            .transpose()?;
        let category = non_blank(self.category).map(|c| parse_category(&c)).transpose()?;
        let value = self.value.map(validate_value).transpose()?;
        Ok(EmissionUpdate {
            date,
            category,
            subcategory: non_blank(self.subcategory),
            value,
            unit: non_blank(self.unit),
            department: non_blank(self.department),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Department {
    pub fn new(name: impl Into<String>, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Department {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            created_at: storage_timestamp(now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DepartmentInput {
    pub fn into_department(self, now: DateTime<Utc>) -> Result<Department, ValidationError> {
        let name = non_blank(self.name).ok_or_else(|| ValidationError(MISSING_DEPARTMENT_NAME.to_string()))?;
        Ok(Department::new(name, self.description.unwrap_or_default(), now))
    }
}
