//! The generic record-table engine.
//!
//! [`RecordTableDef`] is implemented once per record kind. Implementors
//! declare the storage shape (table name, time shape, extension columns,
//! payload (de)serialization, optional child tables and aggregate
//! parameters); the provided methods build every store-level request from
//! that declaration: table creation, additive upgrades, upserts, paginated
//! reads, deletes and aggregations.
//!
//! Builders here are pure: identity resolution and execution happen in
//! [`crate::store::RecordStore`], which hands resolved surrogate keys in
//! and streams rows back out.

use crate::clause::{OrderByClause, SqlJoin, WhereClauses};
use crate::identity::{
    APP_INFO_TABLE, DEVICE_INFO_TABLE, IDENTITY_PRIMARY_COLUMN,
};
use crate::request::{
    AggregateTableRequest, AlterTableRequest, CreateTableRequest, DeleteTableRequest,
    PriorityColumns, ReadTableRequest, UpsertTableRequest,
};
use crate::sql::{ColumnType, RowValues};
use chrono::{DateTime, Utc};
use pulse_core::{
    AggregateResultType, AggregationKind, PageToken, PulseError, Record, RecordCommon, RecordKind,
    RecordTime, RecordingMethod, TimeRange,
};
use std::collections::HashMap;
use uuid::Uuid;

pub const PRIMARY_COLUMN: &str = "row_id";
pub const UUID_COLUMN: &str = "uuid";
pub const CLIENT_RECORD_ID_COLUMN: &str = "client_record_id";
pub const CLIENT_RECORD_VERSION_COLUMN: &str = "client_record_version";
pub const RECORDING_METHOD_COLUMN: &str = "recording_method";
pub const LAST_MODIFIED_TIME_COLUMN: &str = "last_modified_time";
pub const APP_INFO_ID_COLUMN: &str = "app_info_id";
pub const DEVICE_INFO_ID_COLUMN: &str = "device_info_id";

pub const TIME_COLUMN: &str = "time";
pub const ZONE_OFFSET_COLUMN: &str = "zone_offset";
pub const START_TIME_COLUMN: &str = "start_time";
pub const END_TIME_COLUMN: &str = "end_time";
pub const START_ZONE_OFFSET_COLUMN: &str = "start_zone_offset";
pub const END_ZONE_OFFSET_COLUMN: &str = "end_zone_offset";

/// Schema version that introduced the recording-method column.
pub const DB_VERSION_ADD_RECORDING_METHOD: i32 = 4;

/// Whether a record kind stamps a single instant or a start/end interval;
/// decides which shared time columns its table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeShape {
    Instant,
    Interval,
}

impl TimeShape {
    pub fn columns(&self) -> Vec<(&'static str, ColumnType)> {
        match self {
            TimeShape::Instant => vec![
                (TIME_COLUMN, ColumnType::Integer),
                (ZONE_OFFSET_COLUMN, ColumnType::Integer),
            ],
            TimeShape::Interval => vec![
                (START_TIME_COLUMN, ColumnType::Integer),
                (END_TIME_COLUMN, ColumnType::Integer),
                (START_ZONE_OFFSET_COLUMN, ColumnType::Integer),
                (END_ZONE_OFFSET_COLUMN, ColumnType::Integer),
            ],
        }
    }

    /// The column reads order and paginate by.
    pub fn start_time_column(&self) -> &'static str {
        match self {
            TimeShape::Instant => TIME_COLUMN,
            TimeShape::Interval => START_TIME_COLUMN,
        }
    }

    pub fn end_time_column(&self) -> &'static str {
        match self {
            TimeShape::Instant => TIME_COLUMN,
            TimeShape::Interval => END_TIME_COLUMN,
        }
    }

    pub fn zone_offset_column(&self) -> &'static str {
        match self {
            TimeShape::Instant => ZONE_OFFSET_COLUMN,
            TimeShape::Interval => START_ZONE_OFFSET_COLUMN,
        }
    }
}

/// How one aggregation computes for a record kind: which column to
/// aggregate, which time column windows it, an optional join to a child
/// table, and how the numeric result decodes.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateParams {
    pub value_column: String,
    pub time_column: String,
    pub join: Option<SqlJoin>,
    pub result_type: AggregateResultType,
}

/// Surrogate-key -> name maps for one page of rows, produced by the
/// identity registries before decoding.
#[derive(Debug, Clone, Copy)]
pub struct IdentityNames<'a> {
    pub apps: &'a HashMap<i64, String>,
    pub devices: &'a HashMap<i64, String>,
}

pub fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, PulseError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PulseError::Decode(format!("timestamp {millis} out of range")))
}

pub trait RecordTableDef: Send + Sync {
    fn kind(&self) -> RecordKind;

    fn table_name(&self) -> &'static str;

    fn time_shape(&self) -> TimeShape;

    /// Columns beyond the shared base, in creation order. New columns are
    /// only ever introduced through `upgrade_requests`.
    fn extension_columns(&self) -> Vec<(&'static str, ColumnType)>;

    /// Writes the kind-specific payload into an upsert row.
    fn write_payload(&self, record: &Record, row: &mut RowValues) -> Result<(), PulseError>;

    /// Rebuilds the record from a decoded row plus the already-decoded
    /// common metadata and time.
    fn read_payload(
        &self,
        common: RecordCommon,
        time: RecordTime,
        row: &RowValues,
    ) -> Result<Record, PulseError>;

    fn child_table_requests(&self) -> Vec<CreateTableRequest> {
        Vec::new()
    }

    /// Child rows for an upsert: the clears that run first, then the
    /// inserts. Children are replaced wholesale, never merged.
    fn child_upsert_requests(
        &self,
        _record: &Record,
    ) -> Result<(Vec<DeleteTableRequest>, Vec<UpsertTableRequest>), PulseError> {
        Ok((Vec::new(), Vec::new()))
    }

    fn child_read_request(&self, _parent_uuids: &[String]) -> Option<ReadTableRequest> {
        None
    }

    fn child_row_columns(&self) -> Vec<(&'static str, ColumnType)> {
        Vec::new()
    }

    fn apply_child_rows(
        &self,
        _records: &mut [Record],
        _rows: &[RowValues],
    ) -> Result<(), PulseError> {
        Ok(())
    }

    fn aggregate_params(&self, _aggregation: AggregationKind) -> Option<AggregateParams> {
        None
    }

    /// Whether overlapping intervals from different owning apps must not
    /// double-count for this aggregation.
    fn supports_priority(&self, _aggregation: AggregationKind) -> bool {
        false
    }

    // ------------------------------------------------------------------
    // Provided: the engine.
    // ------------------------------------------------------------------

    fn start_time_column(&self) -> &'static str {
        self.time_shape().start_time_column()
    }

    fn zone_offset_column(&self) -> &'static str {
        self.time_shape().zone_offset_column()
    }

    /// Full column list: shared base, shape time columns, then extension
    /// columns.
    fn all_columns(&self) -> Vec<(&'static str, ColumnType)> {
        let mut columns = vec![
            (PRIMARY_COLUMN, ColumnType::PrimaryAutoincrement),
            (UUID_COLUMN, ColumnType::TextNotNullUnique),
            (LAST_MODIFIED_TIME_COLUMN, ColumnType::Integer),
            (CLIENT_RECORD_ID_COLUMN, ColumnType::Text),
            (CLIENT_RECORD_VERSION_COLUMN, ColumnType::Integer),
            (DEVICE_INFO_ID_COLUMN, ColumnType::Integer),
            (APP_INFO_ID_COLUMN, ColumnType::Integer),
            (RECORDING_METHOD_COLUMN, ColumnType::Integer),
        ];
        columns.extend(self.time_shape().columns());
        columns.extend(self.extension_columns());
        columns
    }

    fn create_table_request(&self) -> CreateTableRequest {
        CreateTableRequest::new(self.table_name(), self.all_columns())
            .add_foreign_key(
                DEVICE_INFO_ID_COLUMN,
                DEVICE_INFO_TABLE,
                IDENTITY_PRIMARY_COLUMN,
                false,
            )
            .add_foreign_key(
                APP_INFO_ID_COLUMN,
                APP_INFO_TABLE,
                IDENTITY_PRIMARY_COLUMN,
                false,
            )
            .add_unique_index(
                &format!("idx_{}_client_record", self.table_name()),
                vec![APP_INFO_ID_COLUMN, CLIENT_RECORD_ID_COLUMN],
                Some("client_record_id IS NOT NULL"),
            )
            .with_child_tables(self.child_table_requests())
    }

    /// Additive upgrades between schema versions. Columns are never
    /// removed or retyped: the store may already hold rows written under
    /// the old schema.
    fn upgrade_requests(&self, old_version: i32, _new_version: i32) -> Vec<AlterTableRequest> {
        let mut requests = Vec::new();
        if old_version < DB_VERSION_ADD_RECORDING_METHOD {
            requests.push(AlterTableRequest::new(
                self.table_name(),
                vec![(RECORDING_METHOD_COLUMN, ColumnType::Integer)],
            ));
        }
        requests
    }

    fn upsert_request(
        &self,
        record: &Record,
        app_id: i64,
        device_id: i64,
    ) -> Result<UpsertTableRequest, PulseError> {
        if record.kind() != self.kind() {
            return Err(PulseError::InvalidRequest(format!(
                "{:?} record handed to the {:?} table",
                record.kind(),
                self.kind()
            )));
        }

        let common = record.common();
        let mut row = RowValues::new();
        row.put_text(UUID_COLUMN, &common.uuid.to_string());
        row.put_integer(
            LAST_MODIFIED_TIME_COLUMN,
            common.last_modified.timestamp_millis(),
        );
        row.put_opt_text(CLIENT_RECORD_ID_COLUMN, common.client_record_id.as_deref());
        row.put_opt_integer(CLIENT_RECORD_VERSION_COLUMN, common.client_record_version);
        row.put_integer(DEVICE_INFO_ID_COLUMN, device_id);
        row.put_integer(APP_INFO_ID_COLUMN, app_id);
        row.put_integer(RECORDING_METHOD_COLUMN, common.recording_method.code());

        match (self.time_shape(), record.time()) {
            (TimeShape::Instant, RecordTime::Instant { time, zone_offset_secs }) => {
                row.put_integer(TIME_COLUMN, time.timestamp_millis());
                row.put_integer(ZONE_OFFSET_COLUMN, *zone_offset_secs as i64);
            }
            (
                TimeShape::Interval,
                RecordTime::Interval {
                    start,
                    end,
                    start_zone_offset_secs,
                    end_zone_offset_secs,
                },
            ) => {
                if start > end {
                    return Err(PulseError::InvalidRequest(
                        "interval start is after its end".to_string(),
                    ));
                }
                row.put_integer(START_TIME_COLUMN, start.timestamp_millis());
                row.put_integer(END_TIME_COLUMN, end.timestamp_millis());
                row.put_integer(START_ZONE_OFFSET_COLUMN, *start_zone_offset_secs as i64);
                row.put_integer(END_ZONE_OFFSET_COLUMN, *end_zone_offset_secs as i64);
            }
            _ => {
                return Err(PulseError::InvalidRequest(format!(
                    "{:?} records take {:?} time",
                    self.kind(),
                    self.time_shape()
                )))
            }
        }

        self.write_payload(record, &mut row)?;

        let (child_clear, child_requests) = self.child_upsert_requests(record)?;
        Ok(UpsertTableRequest::new(self.table_name(), row, UUID_COLUMN)
            .with_child_clear(child_clear)
            .with_child_requests(child_requests))
    }

    fn read_request_by_ids(
        &self,
        uuids: &[Uuid],
        app_ids: &[i64],
        max_rows: usize,
    ) -> ReadTableRequest {
        let ids: Vec<String> = uuids.iter().map(|u| u.to_string()).collect();
        let clauses = WhereClauses::new()
            .and_in_text(UUID_COLUMN, &ids)
            .and_in_longs(APP_INFO_ID_COLUMN, app_ids);
        ReadTableRequest::new(self.table_name())
            .with_columns(self.read_column_names())
            .with_where(clauses)
            .with_order_by(OrderByClause::new().and_order_by(self.start_time_column(), true))
            .with_limit(max_rows)
    }

    /// The time-range read backing a paginated page. No SQL limit: rows
    /// stream out ordered by start time and the pagination state machine
    /// stops the stream once the page is cut.
    fn read_request_paged(
        &self,
        app_ids: &[i64],
        range: &TimeRange,
        token: Option<PageToken>,
        ascending: bool,
    ) -> ReadTableRequest {
        let start_column = self.start_time_column();
        let mut clauses = WhereClauses::new().and_in_longs(APP_INFO_ID_COLUMN, app_ids);
        if let Some(token) = token {
            clauses = if ascending {
                clauses.and_at_or_after(start_column, token.time_millis)
            } else {
                clauses.and_at_or_before(start_column, token.time_millis)
            };
        }
        clauses = clauses.and_between(start_column, range.start_millis(), range.end_millis());

        ReadTableRequest::new(self.table_name())
            .with_columns(self.read_column_names())
            .with_where(clauses)
            .with_order_by(OrderByClause::new().and_order_by(start_column, ascending))
    }

    fn read_column_names(&self) -> Vec<String> {
        self.all_columns()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn delete_request_by_ids(&self, uuids: &[Uuid]) -> DeleteTableRequest {
        let ids: Vec<String> = uuids.iter().map(|u| u.to_string()).collect();
        DeleteTableRequest::by_ids(self.table_name(), UUID_COLUMN, &ids)
    }

    fn delete_request_by_filter(&self, app_ids: &[i64], range: &TimeRange) -> DeleteTableRequest {
        DeleteTableRequest::by_time_and_apps(
            self.table_name(),
            self.start_time_column(),
            range.start_millis(),
            range.end_millis(),
            APP_INFO_ID_COLUMN,
            app_ids,
        )
    }

    /// Retention sweep: everything from the epoch up to `now` minus the
    /// retention period, for every owning app.
    fn auto_delete_request(&self, retention_days: u32, now: DateTime<Utc>) -> DeleteTableRequest {
        let cutoff = now - chrono::Duration::days(retention_days as i64);
        DeleteTableRequest::by_time_and_apps(
            self.table_name(),
            self.start_time_column(),
            0,
            cutoff.timestamp_millis(),
            APP_INFO_ID_COLUMN,
            &[],
        )
    }

    fn aggregate_table_request(
        &self,
        aggregation: AggregationKind,
        app_ids: &[i64],
        range: &TimeRange,
    ) -> Result<AggregateTableRequest, PulseError> {
        let params = self
            .aggregate_params(aggregation)
            .ok_or(PulseError::UnsupportedAggregation {
                kind: self.kind(),
                aggregation,
            })?;

        let qualified = params.join.is_some();
        let qualify = |column: &'static str| -> String {
            if qualified {
                format!("{}.{column}", self.table_name())
            } else {
                column.to_string()
            }
        };

        let clauses = WhereClauses::new()
            .and_in_longs(&qualify(APP_INFO_ID_COLUMN), app_ids)
            .and_between(&params.time_column, range.start_millis(), range.end_millis());

        let mut request = AggregateTableRequest::new(
            self.table_name(),
            aggregation,
            &params.value_column,
            &params.time_column,
            params.result_type,
            &qualify(self.zone_offset_column()),
        )
        .with_where(clauses);

        if let Some(join) = params.join {
            request = request.with_join(join);
        }

        if self.supports_priority(aggregation) {
            request = request.with_priority_columns(PriorityColumns {
                start_time: qualify(self.start_time_column()),
                end_time: qualify(self.time_shape().end_time_column()),
                app_info_id: qualify(APP_INFO_ID_COLUMN),
                last_modified_time: qualify(LAST_MODIFIED_TIME_COLUMN),
            });
        }

        Ok(request)
    }

    /// Decodes one stored row back into its domain record, resolving the
    /// app and device surrogate keys through the supplied maps.
    fn decode_row(
        &self,
        row: &RowValues,
        identities: &IdentityNames<'_>,
    ) -> Result<Record, PulseError> {
        let uuid = Uuid::parse_str(row.text(UUID_COLUMN)?)
            .map_err(|e| PulseError::Decode(format!("bad uuid: {e}")))?;

        let app_id = row.integer(APP_INFO_ID_COLUMN)?;
        let package_name = identities
            .apps
            .get(&app_id)
            .cloned()
            .ok_or_else(|| PulseError::Decode(format!("no app for surrogate key {app_id}")))?;

        let device_key = row.integer(DEVICE_INFO_ID_COLUMN)?;
        let device_id = identities
            .devices
            .get(&device_key)
            .cloned()
            .ok_or_else(|| PulseError::Decode(format!("no device for surrogate key {device_key}")))?;

        // Rows written before the recording-method column existed decode
        // as Unknown.
        let recording_method = match row.opt_integer(RECORDING_METHOD_COLUMN)? {
            None => RecordingMethod::Unknown,
            Some(code) => RecordingMethod::from_code(code)
                .ok_or_else(|| PulseError::Decode(format!("bad recording method {code}")))?,
        };

        let common = RecordCommon {
            uuid,
            package_name,
            device_id,
            last_modified: millis_to_datetime(row.integer(LAST_MODIFIED_TIME_COLUMN)?)?,
            client_record_id: row.opt_text(CLIENT_RECORD_ID_COLUMN)?.map(str::to_string),
            client_record_version: row.opt_integer(CLIENT_RECORD_VERSION_COLUMN)?,
            recording_method,
        };

        let time = match self.time_shape() {
            TimeShape::Instant => RecordTime::Instant {
                time: millis_to_datetime(row.integer(TIME_COLUMN)?)?,
                zone_offset_secs: row.integer(ZONE_OFFSET_COLUMN)? as i32,
            },
            TimeShape::Interval => RecordTime::Interval {
                start: millis_to_datetime(row.integer(START_TIME_COLUMN)?)?,
                end: millis_to_datetime(row.integer(END_TIME_COLUMN)?)?,
                start_zone_offset_secs: row.integer(START_ZONE_OFFSET_COLUMN)? as i32,
                end_zone_offset_secs: row.integer(END_ZONE_OFFSET_COLUMN)? as i32,
            },
        };

        self.read_payload(common, time, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{StepsTable, WeightTable};
    use chrono::DateTime;

    fn range(start: i64, end: i64) -> TimeRange {
        TimeRange::new(
            DateTime::from_timestamp_millis(start).unwrap(),
            DateTime::from_timestamp_millis(end).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn create_request_carries_base_shape_and_extension_columns() {
        let statements = StepsTable.create_table_request().statements();

        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS steps_record_table"));
        for column in [
            "row_id BIGSERIAL PRIMARY KEY",
            "uuid TEXT NOT NULL UNIQUE",
            "last_modified_time BIGINT",
            "recording_method BIGINT",
            "start_time BIGINT",
            "end_time BIGINT",
            "count BIGINT",
        ] {
            assert!(statements[0].contains(column), "missing {column}");
        }
        assert!(statements[0].contains("FOREIGN KEY (app_info_id) REFERENCES app_info(row_id)"));
        assert!(statements[0]
            .contains("FOREIGN KEY (device_info_id) REFERENCES device_info(row_id)"));
        // Client-id uniqueness is scoped per owning app and only when the
        // client id is present.
        assert!(statements[1].contains("ON steps_record_table (app_info_id, client_record_id)"));
        assert!(statements[1].contains("WHERE client_record_id IS NOT NULL"));
    }

    #[test]
    fn upgrade_adds_recording_method_exactly_once() {
        let from_v3 = StepsTable.upgrade_requests(3, crate::store::SCHEMA_VERSION);
        assert_eq!(from_v3.len(), 1);
        assert_eq!(
            from_v3[0].add_columns_statement(),
            "ALTER TABLE steps_record_table ADD COLUMN IF NOT EXISTS recording_method BIGINT"
        );

        assert!(StepsTable
            .upgrade_requests(DB_VERSION_ADD_RECORDING_METHOD, crate::store::SCHEMA_VERSION)
            .is_empty());
    }

    #[test]
    fn paged_read_anchors_at_the_token() {
        let ascending = StepsTable
            .read_request_paged(&[2], &range(100, 900), Some(PageToken::new(400, true)), true)
            .statement();
        assert!(ascending.contains("app_info_id IN (2)"));
        assert!(ascending.contains("start_time >= 400"));
        assert!(ascending.contains("start_time >= 100 AND start_time < 900"));
        assert!(ascending.ends_with("ORDER BY start_time ASC"));

        let descending = StepsTable
            .read_request_paged(&[], &range(100, 900), Some(PageToken::new(400, false)), false)
            .statement();
        assert!(descending.contains("start_time <= 400"));
        assert!(descending.ends_with("ORDER BY start_time DESC"));
    }

    #[test]
    fn instant_tables_order_by_their_time_column() {
        let sql = WeightTable
            .read_request_paged(&[], &range(0, 10), None, true)
            .statement();
        assert!(sql.ends_with("ORDER BY time ASC"));
    }

    #[test]
    fn auto_delete_sweeps_from_the_epoch() {
        let now = DateTime::from_timestamp_millis(10_000_000_000).unwrap();
        let sql = StepsTable.auto_delete_request(1, now).statement();
        let cutoff = 10_000_000_000i64 - 24 * 60 * 60 * 1000;
        assert_eq!(
            sql,
            format!(
                "DELETE FROM steps_record_table WHERE start_time >= 0 AND start_time < {cutoff}"
            )
        );
    }

    #[test]
    fn priority_aggregation_projects_the_resolution_columns() {
        let request = StepsTable
            .aggregate_table_request(AggregationKind::Sum, &[1, 2], &range(0, 1000))
            .unwrap();
        assert!(request.is_priority());

        let sql = request.priority_fetch_statement().unwrap();
        assert_eq!(
            sql,
            "SELECT count, start_time, end_time, app_info_id, last_modified_time, \
             start_zone_offset FROM steps_record_table \
             WHERE app_info_id IN (1, 2) AND start_time >= 0 AND start_time < 1000 \
             ORDER BY start_time ASC"
        );
    }

    #[test]
    fn unsupported_aggregation_is_a_contract_error() {
        let err = StepsTable
            .aggregate_table_request(AggregationKind::Average, &[], &range(0, 10))
            .unwrap_err();
        match err {
            PulseError::UnsupportedAggregation { kind, aggregation } => {
                assert_eq!(kind, RecordKind::Steps);
                assert_eq!(aggregation, AggregationKind::Average);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn id_reads_are_capped_and_ordered() {
        let uuid = Uuid::nil();
        let sql = StepsTable.read_request_by_ids(&[uuid], &[7], 5000).statement();
        assert!(sql.contains(&format!("uuid IN ('{uuid}')")));
        assert!(sql.contains("app_info_id IN (7)"));
        assert!(sql.ends_with("ORDER BY start_time ASC LIMIT 5000"));
    }
}
