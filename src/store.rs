//! Storage seam shared by the PostgreSQL and in-memory backends.

use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use crate::models::emission::{Category, Department, EmissionRecord, EmissionUpdate};

/// Query-string value meaning "do not constrain this field".
pub const ALL_SENTINEL: &str = "all";

#[derive(Debug)]
pub enum StoreError {
    /// No emission record carries the requested id
    NotFound(String),
    /// Connection, query or pool failure
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "emission record {} not found", id),
            StoreError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl Error for StoreError {}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        StoreError::Backend(value.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(value: diesel::r2d2::PoolError) -> Self {
        StoreError::Backend(format!("database pool: {}", value))
    }
}

/// Conjunctive record filter; `None` leaves a field unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionFilter {
    pub department: Option<String>,
    pub category: Option<Category>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl EmissionFilter {
    /// Department constraint from a raw query value; blank and `all` mean unconstrained.
    pub fn department_param(raw: Option<&str>) -> Option<String> {
        raw.map(str::trim)
            .filter(|d| !d.is_empty() && *d != ALL_SENTINEL)
            .map(str::to_string)
    }

    pub fn for_department(department: Option<String>) -> Self {
        EmissionFilter {
            department,
            ..Default::default()
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn matches(&self, record: &EmissionRecord) -> bool {
        self.department.as_ref().is_none_or(|d| record.department == *d)
            && self.category.is_none_or(|c| record.category == c)
            && self.start.is_none_or(|s| record.date >= s)
            && self.end.is_none_or(|e| record.date <= e)
    }
}

/// Listing order: newest date first, then newest insert, then id so repeated reads are stable.
pub fn sort_newest_first(records: &mut [EmissionRecord]) {
    records.sort_by(|a, b| {
        (Reverse(a.date), Reverse(a.created_at), &a.id).cmp(&(Reverse(b.date), Reverse(b.created_at), &b.id))
    });
}

pub trait Store: Send + Sync {
    /// Cheap round trip used by the health check and the chatbot precondition.
    fn ping(&self) -> Result<(), StoreError>;

    /// Records matching `filter`, newest date first.
    fn list_emissions(&self, filter: &EmissionFilter) -> Result<Vec<EmissionRecord>, StoreError>;

    /// The `limit` most recently inserted records, newest first.
    fn recent_emissions(&self, limit: usize) -> Result<Vec<EmissionRecord>, StoreError>;

    fn insert_emission(&self, record: &EmissionRecord) -> Result<(), StoreError>;

    /// All-or-nothing batch insert; returns the number of rows written.
    fn insert_emissions(&self, records: &[EmissionRecord]) -> Result<usize, StoreError>;

    fn update_emission(
        &self,
        id: &str,
        update: &EmissionUpdate,
        now: DateTime<Utc>,
    ) -> Result<EmissionRecord, StoreError>;

    fn delete_emission(&self, id: &str) -> Result<(), StoreError>;

    fn list_departments(&self) -> Result<Vec<Department>, StoreError>;

    fn insert_department(&self, department: &Department) -> Result<(), StoreError>;

    fn insert_departments(&self, departments: &[Department]) -> Result<usize, StoreError>;

    /// Remove every emission and department (seeding only).
    fn clear(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emission::EmissionInput;
    use chrono::TimeZone;

    fn record(date: &str, category: &str, department: &str) -> EmissionRecord {
        EmissionInput {
            date: Some(date.into()),
            category: Some(category.into()),
            subcategory: Some("grid".into()),
            value: Some(1.0),
            department: Some(department.into()),
            ..Default::default()
        }
        .into_record(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap()
    }

    #[test]
    fn department_sentinel_and_blank_are_unconstrained() {
        assert_eq!(EmissionFilter::department_param(Some("all")), None);
        assert_eq!(EmissionFilter::department_param(Some("  ")), None);
        assert_eq!(EmissionFilter::department_param(None), None);
        assert_eq!(EmissionFilter::department_param(Some("ops")), Some("ops".to_string()));
    }

    #[test]
    fn filters_are_conjunctive_and_date_bounds_inclusive() {
        let rec = record("2024-03-15", "electricity", "ops");
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        assert!(EmissionFilter::default().matches(&rec));
        assert!(EmissionFilter::for_department(Some("ops".into())).matches(&rec));
        assert!(!EmissionFilter::for_department(Some("it".into())).matches(&rec));

        let exact = EmissionFilter::default().between(d("2024-03-15"), d("2024-03-15"));
        assert!(exact.matches(&rec));

        let mut both = EmissionFilter::for_department(Some("ops".into())).between(d("2024-03-01"), d("2024-03-31"));
        both.category = Some(Category::Heating);
        assert!(!both.matches(&rec));
        both.category = Some(Category::Electricity);
        assert!(both.matches(&rec));

        let open_end = EmissionFilter {
            start: Some(d("2024-03-16")),
            ..Default::default()
        };
        assert!(!open_end.matches(&rec));
    }

    #[test]
    fn newest_date_sorts_first() {
        let mut rows = vec![
            record("2024-01-10", "waste", "a"),
            record("2024-03-01", "waste", "a"),
            record("2024-02-05", "waste", "a"),
        ];
        sort_newest_first(&mut rows);
        let dates: Vec<String> = rows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2024-03-01", "2024-02-05", "2024-01-10"]);
    }
}
