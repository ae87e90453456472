//! Diesel row structs for the `emissions` and `departments` tables.
//!
//! Categories are stored as their lowercase names; conversion back to the
//! domain enum rejects anything the service would not have written.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::models::emission::{Category, Department, EmissionRecord};
use crate::schema;
use crate::store::StoreError;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = schema::emissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmissionRow {
    pub id: String,
    pub date: NaiveDate,
    pub category: String,
    pub subcategory: String,
    pub value: f64,
    pub unit: String,
    pub department: String,
    pub notes: String,
    pub co2_lbs: f64,
    pub co2_kg: f64,
    pub emission_factor: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&EmissionRecord> for EmissionRow {
    fn from(r: &EmissionRecord) -> Self {
        EmissionRow {
            id: r.id.clone(),
            date: r.date,
            category: r.category.as_str().to_string(),
            subcategory: r.subcategory.clone(),
            value: r.value,
            unit: r.unit.clone(),
            department: r.department.clone(),
            notes: r.notes.clone(),
            co2_lbs: r.co2_lbs,
            co2_kg: r.co2_kg,
            emission_factor: r.emission_factor,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl TryFrom<EmissionRow> for EmissionRecord {
    type Error = StoreError;

    fn try_from(row: EmissionRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category)
            .ok_or_else(|| StoreError::Backend(format!("row {} has unknown category '{}'", row.id, row.category)))?;
        Ok(EmissionRecord {
            id: row.id,
            date: row.date,
            category,
            subcategory: row.subcategory,
            value: row.value,
            unit: row.unit,
            department: row.department,
            notes: row.notes,
            co2_lbs: row.co2_lbs,
            co2_kg: row.co2_kg,
            emission_factor: row.emission_factor,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::departments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DepartmentRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Department> for DepartmentRow {
    fn from(d: &Department) -> Self {
        DepartmentRow {
            id: d.id.clone(),
            name: d.name.clone(),
            description: d.description.clone(),
            created_at: d.created_at,
        }
    }
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}
