//! Process-local [`Store`] for tests and throwaway development runs.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::{Mutex, MutexGuard};

use crate::models::emission::{Department, EmissionRecord, EmissionUpdate};
use crate::store::{EmissionFilter, Store, StoreError, sort_newest_first};

#[derive(Debug, Default)]
struct Collections {
    emissions: Vec<EmissionRecord>,
    departments: Vec<Department>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    fn list_emissions(&self, filter: &EmissionFilter) -> Result<Vec<EmissionRecord>, StoreError> {
        let data = self.lock()?;
        let mut rows: Vec<EmissionRecord> = data.emissions.iter().filter(|r| filter.matches(r)).cloned().collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    fn recent_emissions(&self, limit: usize) -> Result<Vec<EmissionRecord>, StoreError> {
        let data = self.lock()?;
        let mut rows = data.emissions.clone();
        rows.sort_by(|a, b| (Reverse(a.created_at), &a.id).cmp(&(Reverse(b.created_at), &b.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn insert_emission(&self, record: &EmissionRecord) -> Result<(), StoreError> {
        self.insert_emissions(std::slice::from_ref(record)).map(|_| ())
    }

    fn insert_emissions(&self, records: &[EmissionRecord]) -> Result<usize, StoreError> {
        let mut data = self.lock()?;
        if let Some(dup) = records
            .iter()
            .find(|r| data.emissions.iter().any(|existing| existing.id == r.id))
        {
            return Err(StoreError::Backend(format!("duplicate emission id {}", dup.id)));
        }
        data.emissions.extend_from_slice(records);
        Ok(records.len())
    }

    fn update_emission(
        &self,
        id: &str,
        update: &EmissionUpdate,
        now: DateTime<Utc>,
    ) -> Result<EmissionRecord, StoreError> {
        let mut data = self.lock()?;
        let record = data
            .emissions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply_update(update, now);
        Ok(record.clone())
    }

    fn delete_emission(&self, id: &str) -> Result<(), StoreError> {
        let mut data = self.lock()?;
        let before = data.emissions.len();
        data.emissions.retain(|r| r.id != id);
        if data.emissions.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_departments(&self) -> Result<Vec<Department>, StoreError> {
        Ok(self.lock()?.departments.clone())
    }

    fn insert_department(&self, department: &Department) -> Result<(), StoreError> {
        self.insert_departments(std::slice::from_ref(department)).map(|_| ())
    }

    fn insert_departments(&self, departments: &[Department]) -> Result<usize, StoreError> {
        let mut data = self.lock()?;
        data.departments.extend_from_slice(departments);
        Ok(departments.len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut data = self.lock()?;
        data.emissions.clear();
        data.departments.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emission::{EmissionInput, EmissionPatch};
    use chrono::TimeZone;

    fn input(date: &str, value: f64) -> EmissionInput {
        EmissionInput {
            date: Some(date.into()),
            category: Some("electricity".into()),
            subcategory: Some("grid".into()),
            value: Some(value),
            department: Some("ops".into()),
            ..Default::default()
        }
    }

    #[test]
    fn update_and_delete_report_missing_ids() {
        let store = MemoryStore::new();
        let err = store
            .update_emission("nope", &EmissionUpdate::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(matches!(store.delete_emission("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_of_missing_id_leaves_state_unchanged() {
        let store = MemoryStore::new();
        let rec = input("2024-01-01", 5.0).into_record(Utc::now()).unwrap();
        store.insert_emission(&rec).unwrap();
        assert!(store.delete_emission("missing").is_err());
        assert_eq!(store.list_emissions(&EmissionFilter::default()).unwrap(), vec![rec.clone()]);
        store.delete_emission(&rec.id).unwrap();
        assert!(store.list_emissions(&EmissionFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn batch_with_duplicate_id_inserts_nothing() {
        let store = MemoryStore::new();
        let rec = input("2024-01-01", 5.0).into_record(Utc::now()).unwrap();
        store.insert_emission(&rec).unwrap();
        let fresh = input("2024-01-02", 1.0).into_record(Utc::now()).unwrap();
        assert!(store.insert_emissions(&[fresh, rec]).is_err());
        assert_eq!(store.list_emissions(&EmissionFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn recent_orders_by_insert_time() {
        let store = MemoryStore::new();
        let t = |h| Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap();
        let old = input("2024-05-31", 1.0).into_record(t(1)).unwrap();
        let new = input("2023-01-01", 1.0).into_record(t(9)).unwrap();
        store.insert_emissions(&[old.clone(), new.clone()]).unwrap();
        let recent = store.recent_emissions(1).unwrap();
        assert_eq!(recent, vec![new]);
    }

    #[test]
    fn update_persists() {
        let store = MemoryStore::new();
        let rec = input("2024-01-01", 5.0).into_record(Utc::now()).unwrap();
        store.insert_emission(&rec).unwrap();
        let update = EmissionPatch {
            value: Some(100.0),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let updated = store.update_emission(&rec.id, &update, Utc::now()).unwrap();
        assert_eq!(updated.co2_lbs, 92.0);
        let listed = store.list_emissions(&EmissionFilter::default()).unwrap();
        assert_eq!(listed[0], updated);
    }
}
