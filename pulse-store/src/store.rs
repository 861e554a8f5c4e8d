//! The Postgres-backed record store.
//!
//! `RecordStore` owns the connection pool, the table registry and the two
//! identity registries, and executes the requests the table definitions
//! build: schema initialization and versioned upgrades, upserts, paginated
//! reads (driving the row stream through [`GroupPaginator`]), deletes and
//! aggregations. Every operation is a synchronous request/response against
//! the pool. No retries happen here; callers own retry policy.

use crate::aggregation::{resolve_priority_value, SourceInterval};
use crate::identity::IdentityRegistry;
use crate::pagination::GroupPaginator;
use crate::request::ReadTableRequest;
use crate::sql::{ColumnType, RowValues, SqlValue};
use crate::table::{IdentityNames, RecordTableDef, APP_INFO_ID_COLUMN, DEVICE_INFO_ID_COLUMN, UUID_COLUMN};
use crate::tables::TableRegistry;
use chrono::Utc;
use futures::TryStreamExt;
use pulse_core::{
    AggregateOutcome, AggregateRecordsRequest, AggregateResultType, AggregateValue, PageToken,
    PulseError, ReadRecordsPage, ReadRecordsRequest, Record, RecordKind, TimeRange,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MAXIMUM_PAGE_SIZE: usize = 5000;

/// Current schema version. Version 4 introduced the recording-method
/// column.
pub const SCHEMA_VERSION: i32 = 4;

const SCHEMA_VERSION_TABLE: &str = "schema_version";

pub struct RecordStore {
    pool: PgPool,
    registry: TableRegistry,
    apps: IdentityRegistry,
    devices: IdentityRegistry,
}

impl RecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            registry: TableRegistry::new(),
            apps: IdentityRegistry::apps(),
            devices: IdentityRegistry::devices(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn def(&self, kind: RecordKind) -> Result<&dyn RecordTableDef, PulseError> {
        self.registry
            .get(kind)
            .ok_or_else(|| PulseError::InvalidRequest(format!("no table for {kind:?}")))
    }

    // ------------------------------------------------------------------
    // Schema lifecycle
    // ------------------------------------------------------------------

    /// Creates identity and record tables and brings the schema version up
    /// to [`SCHEMA_VERSION`]. Each version increment applies inside its own
    /// transaction: an upgrade either lands completely or not at all.
    pub async fn initialize(&self) -> Result<(), PulseError> {
        for registry in [&self.apps, &self.devices] {
            for statement in registry.create_table_request().statements() {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA_VERSION_TABLE} \
             (row_id BIGINT PRIMARY KEY, version BIGINT NOT NULL)"
        ))
        .execute(&self.pool)
        .await?;

        let installed: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT version FROM {SCHEMA_VERSION_TABLE} WHERE row_id = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        for def in self.registry.all() {
            for statement in def.create_table_request().statements() {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }

        match installed {
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {SCHEMA_VERSION_TABLE} (row_id, version) VALUES (1, $1)"
                ))
                .bind(SCHEMA_VERSION as i64)
                .execute(&self.pool)
                .await?;
                tracing::info!(version = SCHEMA_VERSION, "Initialized fresh schema");
            }
            Some(installed) => {
                let installed = installed as i32;
                for version in (installed + 1)..=SCHEMA_VERSION {
                    self.apply_upgrade(version).await?;
                }
            }
        }

        Ok(())
    }

    async fn apply_upgrade(&self, version: i32) -> Result<(), PulseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PulseError::Migration(e.to_string()))?;

        for def in self.registry.all() {
            for request in def.upgrade_requests(version - 1, version) {
                sqlx::query(&request.add_columns_statement())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        PulseError::Migration(format!(
                            "upgrade to version {version} failed on {}: {e}",
                            request.table_name()
                        ))
                    })?;
            }
        }

        sqlx::query(&format!(
            "UPDATE {SCHEMA_VERSION_TABLE} SET version = $1 WHERE row_id = 1"
        ))
        .bind(version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| PulseError::Migration(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PulseError::Migration(e.to_string()))?;

        tracing::info!(version, "Applied schema upgrade");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Full upsert: idempotent on the record uuid, overwriting prior
    /// values on conflict. Child rows are replaced wholesale.
    pub async fn upsert(&self, record: &Record) -> Result<(), PulseError> {
        let def = self.def(record.kind())?;
        let common = record.common();
        let app_id = self
            .apps
            .resolve_or_create(&self.pool, &common.package_name)
            .await?;
        let device_id = self
            .devices
            .resolve_or_create(&self.pool, &common.device_id)
            .await?;

        let request = def.upsert_request(record, app_id, device_id)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&request.statement()).execute(&mut *tx).await?;
        for clear in request.child_clear() {
            sqlx::query(&clear.statement()).execute(&mut *tx).await?;
        }
        for child in request.child_requests() {
            sqlx::query(&child.statement()).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::debug!(kind = ?record.kind(), uuid = %common.uuid, "Upserted record");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn read(&self, request: &ReadRecordsRequest) -> Result<ReadRecordsPage, PulseError> {
        let def = self.def(request.kind)?;

        if let Some(ids) = &request.id_filter {
            if ids.is_empty() {
                return Err(PulseError::InvalidRequest("empty id filter".to_string()));
            }
            if request.page_token.is_some() {
                return Err(PulseError::InvalidRequest(
                    "id filter and page token are mutually exclusive".to_string(),
                ));
            }
            let app_ids = self.resolve_filter(&request.package_filter).await?;
            let read = def.read_request_by_ids(ids, &app_ids, MAXIMUM_PAGE_SIZE);
            let rows = self.fetch_rows(&read, &def.all_columns()).await?;
            let records = self.decode_rows(def, rows).await?;
            return Ok(ReadRecordsPage {
                records,
                next_page_token: None,
            });
        }

        let app_ids = self.resolve_filter(&request.package_filter).await?;
        let page_size = effective_page_size(request.page_size);
        let token = decode_request_token(request.page_token, request.ascending)?;

        let read = def.read_request_paged(&app_ids, &request.time_range, token, request.ascending);
        let sql = read.statement();
        let columns = def.all_columns();
        let start_column = def.start_time_column();

        let mut paginator: GroupPaginator<RowValues> =
            GroupPaginator::new(page_size, request.ascending);
        {
            let mut stream = sqlx::query(&sql).fetch(&self.pool);
            while let Some(pg_row) = stream.try_next().await? {
                let row = row_values_from_pg(&pg_row, &columns)?;
                let time = row.integer(start_column)?;
                if !paginator.push(time, row) {
                    break;
                }
            }
        }

        let page = paginator.finish();
        let records = self.decode_rows(def, page.items).await?;
        Ok(ReadRecordsPage {
            records,
            next_page_token: page.next_token.map(|token| token.encode()),
        })
    }

    async fn fetch_rows(
        &self,
        read: &ReadTableRequest,
        columns: &[(&'static str, ColumnType)],
    ) -> Result<Vec<RowValues>, PulseError> {
        let pg_rows = sqlx::query(&read.statement()).fetch_all(&self.pool).await?;
        pg_rows
            .iter()
            .map(|row| row_values_from_pg(row, columns))
            .collect()
    }

    /// Decodes a page of rows: batch-resolves the surrogate keys back to
    /// names, rebuilds each record, then attaches child rows.
    async fn decode_rows(
        &self,
        def: &dyn RecordTableDef,
        rows: Vec<RowValues>,
    ) -> Result<Vec<Record>, PulseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut app_ids = Vec::with_capacity(rows.len());
        let mut device_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            app_ids.push(row.integer(APP_INFO_ID_COLUMN)?);
            device_ids.push(row.integer(DEVICE_INFO_ID_COLUMN)?);
        }
        let apps = self.apps.names_for(&self.pool, &app_ids).await?;
        let devices = self.devices.names_for(&self.pool, &device_ids).await?;
        let identities = IdentityNames {
            apps: &apps,
            devices: &devices,
        };

        let mut records = rows
            .iter()
            .map(|row| def.decode_row(row, &identities))
            .collect::<Result<Vec<Record>, PulseError>>()?;

        let uuids: Vec<String> = records
            .iter()
            .map(|record| record.common().uuid.to_string())
            .collect();
        if let Some(child_read) = def.child_read_request(&uuids) {
            let child_rows = self.fetch_rows(&child_read, &def.child_row_columns()).await?;
            def.apply_child_rows(&mut records, &child_rows)?;
        }

        Ok(records)
    }

    /// Resolves an owning-app filter to surrogate keys. A non-empty filter
    /// in which no name resolves is a contract violation, not an empty
    /// result.
    async fn resolve_filter(&self, packages: &[String]) -> Result<Vec<i64>, PulseError> {
        if packages.is_empty() {
            return Ok(Vec::new());
        }
        let resolved = self.apps.resolve_many(&self.pool, packages).await?;
        filter_ids_or_unknown(packages, resolved)
    }

    // ------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------

    /// Delete by explicit id list. Unless bypassed, every target must be
    /// owned by the calling app; one mismatch fails the whole call before
    /// anything is deleted.
    pub async fn delete_by_ids(
        &self,
        kind: RecordKind,
        caller_package: &str,
        uuids: &[Uuid],
        bypass_ownership_check: bool,
    ) -> Result<u64, PulseError> {
        let def = self.def(kind)?;
        if uuids.is_empty() {
            return Err(PulseError::InvalidRequest("empty id list".to_string()));
        }

        if !bypass_ownership_check {
            let caller = self
                .apps
                .resolve(&self.pool, caller_package)
                .await?
                .ok_or_else(|| PulseError::UnknownApp(caller_package.to_string()))?;

            let owners = def.read_request_by_ids(uuids, &[], MAXIMUM_PAGE_SIZE);
            let rows = self.fetch_rows(&owners, &def.all_columns()).await?;
            for row in &rows {
                if row.integer(APP_INFO_ID_COLUMN)? != caller {
                    let uuid = Uuid::parse_str(row.text(UUID_COLUMN)?)
                        .map_err(|e| PulseError::Decode(format!("bad uuid: {e}")))?;
                    return Err(PulseError::OwnershipMismatch(uuid));
                }
            }
        }

        let delete = def.delete_request_by_ids(uuids);
        let result = sqlx::query(&delete.statement()).execute(&self.pool).await?;
        tracing::debug!(kind = ?kind, deleted = result.rows_affected(), "Deleted by id list");
        Ok(result.rows_affected())
    }

    /// Delete by time window and owning-app filter. Used by retention
    /// sweeps; no per-row ownership check beyond the filter itself.
    pub async fn delete_by_filter(
        &self,
        kind: RecordKind,
        package_filter: &[String],
        range: &TimeRange,
    ) -> Result<u64, PulseError> {
        let def = self.def(kind)?;
        let app_ids = self.resolve_filter(package_filter).await?;
        let delete = def.delete_request_by_filter(&app_ids, range);
        let result = sqlx::query(&delete.statement()).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Retention sweep across every record kind.
    pub async fn auto_delete(&self, retention_days: u32) -> Result<u64, PulseError> {
        if retention_days == 0 {
            return Ok(0);
        }
        let now = Utc::now();
        let mut total = 0u64;
        for def in self.registry.all() {
            let delete = def.auto_delete_request(retention_days, now);
            let result = sqlx::query(&delete.statement()).execute(&self.pool).await?;
            total += result.rows_affected();
        }
        tracing::info!(retention_days, deleted = total, "Auto-delete sweep finished");
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    pub async fn aggregate(
        &self,
        request: &AggregateRecordsRequest,
    ) -> Result<AggregateOutcome, PulseError> {
        let def = self.def(request.kind)?;
        let app_ids = self.resolve_filter(&request.package_filter).await?;
        let aggregate =
            def.aggregate_table_request(request.aggregation, &app_ids, &request.time_range)?;

        if let Some(sql) = aggregate.priority_fetch_statement() {
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            let mut intervals = Vec::with_capacity(rows.len());
            let mut zone_offset: Option<i32> = None;

            for row in &rows {
                let value = match aggregate.result_type() {
                    AggregateResultType::Long | AggregateResultType::DurationMillis => row
                        .try_get::<i64, _>(0)
                        .map_err(|e| PulseError::Decode(e.to_string()))?
                        as f64,
                    AggregateResultType::Double => row
                        .try_get::<f64, _>(0)
                        .map_err(|e| PulseError::Decode(e.to_string()))?,
                };
                intervals.push(SourceInterval {
                    start_millis: row
                        .try_get::<i64, _>(1)
                        .map_err(|e| PulseError::Decode(e.to_string()))?,
                    end_millis: row
                        .try_get::<i64, _>(2)
                        .map_err(|e| PulseError::Decode(e.to_string()))?,
                    app_id: row
                        .try_get::<i64, _>(3)
                        .map_err(|e| PulseError::Decode(e.to_string()))?,
                    last_modified_millis: row
                        .try_get::<i64, _>(4)
                        .map_err(|e| PulseError::Decode(e.to_string()))?,
                    value,
                });
                if zone_offset.is_none() {
                    let offset: Option<i64> = row
                        .try_get(5)
                        .map_err(|e| PulseError::Decode(e.to_string()))?;
                    zone_offset = offset.map(|z| z as i32);
                }
            }

            let window = (
                request.time_range.start_millis(),
                request.time_range.end_millis(),
            );
            Ok(AggregateOutcome {
                value: resolve_priority_value(&intervals, window, aggregate.result_type()),
                zone_offset_secs: zone_offset,
            })
        } else {
            let row = sqlx::query(&aggregate.aggregate_statement())
                .fetch_one(&self.pool)
                .await?;
            let value = match aggregate.result_type() {
                AggregateResultType::Long => row
                    .try_get::<Option<i64>, _>("agg")
                    .map_err(|e| PulseError::Decode(e.to_string()))?
                    .map(AggregateValue::Long),
                AggregateResultType::DurationMillis => row
                    .try_get::<Option<i64>, _>("agg")
                    .map_err(|e| PulseError::Decode(e.to_string()))?
                    .map(AggregateValue::DurationMillis),
                AggregateResultType::Double => row
                    .try_get::<Option<f64>, _>("agg")
                    .map_err(|e| PulseError::Decode(e.to_string()))?
                    .map(AggregateValue::Double),
            };
            let zone_offset: Option<i64> = row
                .try_get("zone_offset")
                .map_err(|e| PulseError::Decode(e.to_string()))?;
            Ok(AggregateOutcome {
                value,
                zone_offset_secs: zone_offset.map(|z| z as i32),
            })
        }
    }
}

/// Collapses resolver output for a non-empty filter: names that resolved
/// pass through, and zero resolved keys is an unknown-app failure so "no
/// data for a known app" and "app not recognized" stay distinguishable.
fn filter_ids_or_unknown(
    packages: &[String],
    resolved: Vec<Option<i64>>,
) -> Result<Vec<i64>, PulseError> {
    let ids: Vec<i64> = resolved.into_iter().flatten().collect();
    if ids.is_empty() {
        return Err(PulseError::UnknownApp(packages.join(", ")));
    }
    Ok(ids)
}

/// Clamp the requested page size into `[1, MAXIMUM_PAGE_SIZE]`.
fn effective_page_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAXIMUM_PAGE_SIZE)
}

/// Decode and validate a raw page token against the request's sort order.
fn decode_request_token(
    raw: Option<i64>,
    ascending: bool,
) -> Result<Option<PageToken>, PulseError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let token = PageToken::decode(raw)
        .ok_or_else(|| PulseError::InvalidRequest(format!("bad page token {raw}")))?;
    if token.ascending != ascending {
        return Err(PulseError::InvalidRequest(
            "page token direction does not match the requested sort order".to_string(),
        ));
    }
    Ok(Some(token))
}

/// Converts a fetched Postgres row into the engine's column/value map
/// using the table's declared column types.
fn row_values_from_pg(
    row: &PgRow,
    columns: &[(&'static str, ColumnType)],
) -> Result<RowValues, PulseError> {
    let mut values = RowValues::new();
    for (name, ty) in columns {
        match ty {
            ColumnType::PrimaryAutoincrement | ColumnType::Integer => {
                let value: Option<i64> = row
                    .try_get(*name)
                    .map_err(|e| PulseError::Decode(format!("column {name}: {e}")))?;
                values.put(name, value.map_or(SqlValue::Null, SqlValue::Integer));
            }
            ColumnType::Real => {
                let value: Option<f64> = row
                    .try_get(*name)
                    .map_err(|e| PulseError::Decode(format!("column {name}: {e}")))?;
                values.put(name, value.map_or(SqlValue::Null, SqlValue::Real));
            }
            ColumnType::Text | ColumnType::TextNotNullUnique => {
                let value: Option<String> = row
                    .try_get(*name)
                    .map_err(|e| PulseError::Decode(format!("column {name}: {e}")))?;
                values.put(name, value.map_or(SqlValue::Null, SqlValue::Text));
            }
        }
    }
    Ok(values)
}
