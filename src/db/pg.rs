//! PostgreSQL-backed [`Store`] using a diesel r2d2 connection pool.

use chrono::{DateTime, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{debug, info};

use crate::db::models::{DepartmentRow, EmissionRow};
use crate::models::emission::{Department, EmissionRecord, EmissionUpdate};
use crate::schema;
use crate::store::{EmissionFilter, Store, StoreError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// Keeps each INSERT well under the 65535 bind-parameter limit (13 columns per row).
const INSERT_CHUNK_ROWS: usize = 1000;

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: PgPool,
}

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

impl PgStore {
    /// Build the pool, verify connectivity and bring the schema up to date.
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, String> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| format!("DB connection failed: {}", e))?;
        let mut conn = pool.get().map_err(|e| format!("DB connection failed: {}", e))?;
        apply_database_migrations(&mut conn)?;
        Ok(PgStore { pool })
    }

    fn conn(&self) -> Result<PgPooled, StoreError> {
        Ok(self.pool.get()?)
    }
}

type LockedEmission<'a> = diesel::dsl::ForUpdate<diesel::dsl::Find<schema::emissions::table, &'a str>>;

/// Row lock held until the surrounding transaction ends, so concurrent partial
/// updates of one record apply one after the other.
fn lock_emission(id: &str) -> LockedEmission<'_> {
    schema::emissions::table.find(id).for_update()
}

fn rows_to_records(rows: Vec<EmissionRow>) -> Result<Vec<EmissionRecord>, StoreError> {
    rows.into_iter().map(EmissionRecord::try_from).collect()
}

impl Store for PgStore {
    fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn list_emissions(&self, filter: &EmissionFilter) -> Result<Vec<EmissionRecord>, StoreError> {
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        let mut query = E::emissions.select(EmissionRow::as_select()).into_boxed();
        if let Some(department) = &filter.department {
            query = query.filter(E::department.eq(department.clone()));
        }
        if let Some(category) = filter.category {
            query = query.filter(E::category.eq(category.as_str()));
        }
        if let Some(start) = filter.start {
            query = query.filter(E::date.ge(start));
        }
        if let Some(end) = filter.end {
            query = query.filter(E::date.le(end));
        }

        let rows: Vec<EmissionRow> = query
            .order((E::date.desc(), E::created_at.desc(), E::id.asc()))
            .load(&mut conn)?;
        debug!("list_emissions: {:?} matched {} row(s)", filter, rows.len());
        rows_to_records(rows)
    }

    fn recent_emissions(&self, limit: usize) -> Result<Vec<EmissionRecord>, StoreError> {
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        let rows: Vec<EmissionRow> = E::emissions
            .select(EmissionRow::as_select())
            .order((E::created_at.desc(), E::id.asc()))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .load(&mut conn)?;
        rows_to_records(rows)
    }

    fn insert_emission(&self, record: &EmissionRecord) -> Result<(), StoreError> {
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        diesel::insert_into(E::emissions)
            .values(&EmissionRow::from(record))
            .execute(&mut conn)?;
        Ok(())
    }

    fn insert_emissions(&self, records: &[EmissionRecord]) -> Result<usize, StoreError> {
        use schema::emissions::dsl as E;

        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<EmissionRow> = records.iter().map(EmissionRow::from).collect();
        let mut conn = self.conn()?;
        let inserted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut total = 0;
            for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
                total += diesel::insert_into(E::emissions).values(chunk).execute(conn)?;
            }
            Ok(total)
        })?;
        Ok(inserted)
    }

    fn update_emission(
        &self,
        id: &str,
        update: &EmissionUpdate,
        now: DateTime<Utc>,
    ) -> Result<EmissionRecord, StoreError> {
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let row: EmissionRow = lock_emission(id)
                .first(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let mut record = EmissionRecord::try_from(row)?;
            record.apply_update(update, now);

            diesel::update(E::emissions.filter(E::id.eq(id)))
                .set(&EmissionRow::from(&record))
                .execute(conn)?;
            Ok(record)
        })
    }

    fn delete_emission(&self, id: &str) -> Result<(), StoreError> {
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        let deleted = diesel::delete(E::emissions.filter(E::id.eq(id))).execute(&mut conn)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_departments(&self) -> Result<Vec<Department>, StoreError> {
        use schema::departments::dsl as D;

        let mut conn = self.conn()?;
        let rows: Vec<DepartmentRow> = D::departments
            .select(DepartmentRow::as_select())
            .order((D::created_at.asc(), D::name.asc()))
            .load(&mut conn)?;
        Ok(rows.into_iter().map(Department::from).collect())
    }

    fn insert_department(&self, department: &Department) -> Result<(), StoreError> {
        use schema::departments::dsl as D;

        let mut conn = self.conn()?;
        diesel::insert_into(D::departments)
            .values(&DepartmentRow::from(department))
            .execute(&mut conn)?;
        Ok(())
    }

    fn insert_departments(&self, departments: &[Department]) -> Result<usize, StoreError> {
        use schema::departments::dsl as D;

        if departments.is_empty() {
            return Ok(0);
        }
        let rows: Vec<DepartmentRow> = departments.iter().map(DepartmentRow::from).collect();
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(D::departments).values(&rows).execute(&mut conn)?)
    }

    fn clear(&self) -> Result<(), StoreError> {
        use schema::departments::dsl as D;
        use schema::emissions::dsl as E;

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::delete(E::emissions).execute(conn)?;
            diesel::delete(D::departments).execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::pg::Pg;

    #[test]
    fn update_reads_the_row_under_a_lock() {
        let sql = diesel::debug_query::<Pg, _>(&lock_emission("abc")).to_string();
        assert!(sql.contains("FROM \"emissions\""), "{sql}");
        assert!(sql.contains("\"emissions\".\"id\" = $1"), "{sql}");
        assert!(sql.trim_end().contains("FOR UPDATE"), "{sql}");
    }
}
