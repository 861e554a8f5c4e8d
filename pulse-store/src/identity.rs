//! Surrogate-key registries for owning apps and originating devices.
//!
//! Each registry fronts one small identity table with a bidirectional
//! in-process cache. Creation on first sight goes through
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a re-select, so two
//! callers racing on the same unseen identity converge on a single row.
//! Registries are constructed at startup and passed to the store
//! explicitly; there is no global instance.

use crate::request::CreateTableRequest;
use crate::sql::ColumnType;
use pulse_core::PulseError;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;

pub const APP_INFO_TABLE: &str = "app_info";
pub const DEVICE_INFO_TABLE: &str = "device_info";
pub const IDENTITY_PRIMARY_COLUMN: &str = "row_id";
pub const APP_NAME_COLUMN: &str = "package_name";
pub const DEVICE_NAME_COLUMN: &str = "device_identifier";

#[derive(Debug)]
pub struct IdentityRegistry {
    table: &'static str,
    name_column: &'static str,
    by_name: RwLock<HashMap<String, i64>>,
    by_id: RwLock<HashMap<i64, String>>,
}

impl IdentityRegistry {
    pub fn apps() -> Self {
        Self::new(APP_INFO_TABLE, APP_NAME_COLUMN)
    }

    pub fn devices() -> Self {
        Self::new(DEVICE_INFO_TABLE, DEVICE_NAME_COLUMN)
    }

    fn new(table: &'static str, name_column: &'static str) -> Self {
        Self {
            table,
            name_column,
            by_name: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
        }
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    pub fn create_table_request(&self) -> CreateTableRequest {
        CreateTableRequest::new(
            self.table,
            vec![
                (IDENTITY_PRIMARY_COLUMN, ColumnType::PrimaryAutoincrement),
                (self.name_column, ColumnType::TextNotNullUnique),
            ],
        )
    }

    fn cached(&self, name: &str) -> Option<i64> {
        self.by_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }

    fn remember(&self, name: &str, id: i64) {
        self.by_name
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), id);
        self.by_id
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, name.to_string());
    }

    /// Looks the identity up without creating it. `None` means the store
    /// has never seen this name.
    pub async fn resolve(&self, pool: &PgPool, name: &str) -> Result<Option<i64>, PulseError> {
        if let Some(id) = self.cached(name) {
            return Ok(Some(id));
        }
        let sql = format!(
            "SELECT {IDENTITY_PRIMARY_COLUMN} FROM {} WHERE {} = $1",
            self.table, self.name_column
        );
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if let Some(id) = id {
            self.remember(name, id);
        }
        Ok(id)
    }

    /// Looks the identity up, creating the row on first sight.
    pub async fn resolve_or_create(&self, pool: &PgPool, name: &str) -> Result<i64, PulseError> {
        if let Some(id) = self.cached(name) {
            return Ok(id);
        }
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ($1) ON CONFLICT ({}) DO NOTHING",
            self.table, self.name_column, self.name_column
        );
        sqlx::query(&insert).bind(name).execute(pool).await?;

        match self.resolve(pool, name).await? {
            Some(id) => Ok(id),
            // The row was inserted (or already present) above; a miss here
            // means it vanished between statements.
            None => Err(PulseError::Database(sqlx::Error::RowNotFound)),
        }
    }

    pub async fn resolve_many(
        &self,
        pool: &PgPool,
        names: &[String],
    ) -> Result<Vec<Option<i64>>, PulseError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            ids.push(self.resolve(pool, name).await?);
        }
        Ok(ids)
    }

    /// Reverse lookup for a page of decoded rows. Ids already cached skip
    /// the query; the rest are fetched in one batch.
    pub async fn names_for(
        &self,
        pool: &PgPool,
        ids: &[i64],
    ) -> Result<HashMap<i64, String>, PulseError> {
        let mut names: HashMap<i64, String> = HashMap::new();
        let mut missing: Vec<i64> = Vec::new();
        {
            let by_id = self.by_id.read().unwrap_or_else(|e| e.into_inner());
            for id in ids {
                match by_id.get(id) {
                    Some(name) => {
                        names.insert(*id, name.clone());
                    }
                    None => missing.push(*id),
                }
            }
        }

        if !missing.is_empty() {
            missing.sort_unstable();
            missing.dedup();
            let sql = format!(
                "SELECT {IDENTITY_PRIMARY_COLUMN}, {} FROM {} WHERE {IDENTITY_PRIMARY_COLUMN} = ANY($1)",
                self.name_column, self.table
            );
            let rows: Vec<(i64, String)> = sqlx::query_as(&sql)
                .bind(&missing)
                .fetch_all(pool)
                .await?;
            for (id, name) in rows {
                self.remember(&name, id);
                names.insert(id, name);
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_round_trip() {
        let registry = IdentityRegistry::apps();
        assert_eq!(registry.cached("com.example.tracker"), None);
        registry.remember("com.example.tracker", 7);
        assert_eq!(registry.cached("com.example.tracker"), Some(7));
    }

    #[test]
    fn identity_tables_have_unique_name_columns() {
        let statements = IdentityRegistry::apps().create_table_request().statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "CREATE TABLE IF NOT EXISTS app_info (row_id BIGSERIAL PRIMARY KEY, \
             package_name TEXT NOT NULL UNIQUE)"
        );

        let device = IdentityRegistry::devices().create_table_request().statements();
        assert!(device[0].contains("device_identifier TEXT NOT NULL UNIQUE"));
    }
}
