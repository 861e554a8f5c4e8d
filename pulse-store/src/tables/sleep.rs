//! Sleep sessions: an interval with an optional title. The supported
//! aggregation is total slept time, which is priority-sensitive: two apps
//! tracking the same night must not count it twice.

use crate::sql::{ColumnType, RowValues};
use crate::table::{
    AggregateParams, RecordTableDef, TimeShape, END_TIME_COLUMN, START_TIME_COLUMN,
};
use pulse_core::{
    AggregateResultType, AggregationKind, PulseError, Record, RecordCommon, RecordKind, RecordTime,
};

pub const SLEEP_SESSION_TABLE: &str = "sleep_session_record_table";
pub const TITLE_COLUMN: &str = "title";

pub struct SleepSessionTable;

impl RecordTableDef for SleepSessionTable {
    fn kind(&self) -> RecordKind {
        RecordKind::SleepSession
    }

    fn table_name(&self) -> &'static str {
        SLEEP_SESSION_TABLE
    }

    fn time_shape(&self) -> TimeShape {
        TimeShape::Interval
    }

    fn extension_columns(&self) -> Vec<(&'static str, ColumnType)> {
        vec![(TITLE_COLUMN, ColumnType::Text)]
    }

    fn write_payload(&self, record: &Record, row: &mut RowValues) -> Result<(), PulseError> {
        match record {
            Record::SleepSession { title, .. } => {
                row.put_opt_text(TITLE_COLUMN, title.as_deref());
                Ok(())
            }
            _ => Err(PulseError::InvalidRequest(
                "expected a sleep session record".to_string(),
            )),
        }
    }

    fn read_payload(
        &self,
        common: RecordCommon,
        time: RecordTime,
        row: &RowValues,
    ) -> Result<Record, PulseError> {
        Ok(Record::SleepSession {
            common,
            time,
            title: row.opt_text(TITLE_COLUMN)?.map(str::to_string),
        })
    }

    fn aggregate_params(&self, aggregation: AggregationKind) -> Option<AggregateParams> {
        match aggregation {
            // The aggregated quantity is the session length itself.
            AggregationKind::Sum => Some(AggregateParams {
                value_column: format!("{END_TIME_COLUMN} - {START_TIME_COLUMN}"),
                time_column: START_TIME_COLUMN.to_string(),
                join: None,
                result_type: AggregateResultType::DurationMillis,
            }),
            _ => None,
        }
    }

    fn supports_priority(&self, aggregation: AggregationKind) -> bool {
        aggregation == AggregationKind::Sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use pulse_core::RecordingMethod;
    use uuid::Uuid;

    fn sleep_record(title: Option<&str>) -> Record {
        Record::SleepSession {
            common: RecordCommon {
                uuid: Uuid::new_v4(),
                package_name: "com.example.sleep".to_string(),
                device_id: "band-2".to_string(),
                last_modified: DateTime::from_timestamp_millis(50_000).unwrap(),
                client_record_id: None,
                client_record_version: None,
                recording_method: RecordingMethod::AutomaticallyRecorded,
            },
            time: RecordTime::Interval {
                start: DateTime::from_timestamp_millis(10_000).unwrap(),
                end: DateTime::from_timestamp_millis(40_000).unwrap(),
                start_zone_offset_secs: 0,
                end_zone_offset_secs: 0,
            },
            title: title.map(str::to_string),
        }
    }

    #[test]
    fn title_is_nullable() {
        let request = SleepSessionTable
            .upsert_request(&sleep_record(None), 1, 1)
            .unwrap();
        assert_eq!(request.row().opt_text("title").unwrap(), None);

        let request = SleepSessionTable
            .upsert_request(&sleep_record(Some("nap")), 1, 1)
            .unwrap();
        assert_eq!(request.row().opt_text("title").unwrap(), Some("nap"));
    }

    #[test]
    fn duration_sum_aggregates_the_interval_length() {
        let params = SleepSessionTable
            .aggregate_params(AggregationKind::Sum)
            .unwrap();
        assert_eq!(params.value_column, "end_time - start_time");
        assert_eq!(params.result_type, AggregateResultType::DurationMillis);
        assert!(SleepSessionTable.supports_priority(AggregationKind::Sum));
    }
}
