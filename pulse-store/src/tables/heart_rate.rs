//! Heart-rate records: an interval on the main table and one child series
//! row per sample. Aggregations run over the series values through a join;
//! samples are replaced wholesale when a record is re-upserted.

use crate::clause::{OrderByClause, SqlJoin, WhereClauses};
use crate::request::{CreateTableRequest, DeleteTableRequest, ReadTableRequest, UpsertTableRequest};
use crate::sql::{ColumnType, RowValues};
use crate::table::{
    millis_to_datetime, AggregateParams, RecordTableDef, TimeShape, PRIMARY_COLUMN,
    START_TIME_COLUMN, UUID_COLUMN,
};
use pulse_core::models::record::HeartRateSample;
use pulse_core::{
    AggregateResultType, AggregationKind, PulseError, Record, RecordCommon, RecordKind, RecordTime,
};
use std::collections::HashMap;

pub const HEART_RATE_TABLE: &str = "heart_rate_record_table";
pub const SERIES_TABLE: &str = "heart_rate_record_series_table";
pub const PARENT_UUID_COLUMN: &str = "parent_uuid";
pub const SAMPLE_TIME_COLUMN: &str = "sample_time";
pub const BPM_COLUMN: &str = "beats_per_minute";

pub struct HeartRateTable;

impl HeartRateTable {
    fn series_join(&self) -> SqlJoin {
        SqlJoin::inner(
            SERIES_TABLE,
            &format!("{HEART_RATE_TABLE}.{UUID_COLUMN}"),
            &format!("{SERIES_TABLE}.{PARENT_UUID_COLUMN}"),
        )
    }
}

impl RecordTableDef for HeartRateTable {
    fn kind(&self) -> RecordKind {
        RecordKind::HeartRate
    }

    fn table_name(&self) -> &'static str {
        HEART_RATE_TABLE
    }

    fn time_shape(&self) -> TimeShape {
        TimeShape::Interval
    }

    fn extension_columns(&self) -> Vec<(&'static str, ColumnType)> {
        Vec::new()
    }

    fn write_payload(&self, record: &Record, _row: &mut RowValues) -> Result<(), PulseError> {
        match record {
            // Samples live in the series table only.
            Record::HeartRate { .. } => Ok(()),
            _ => Err(PulseError::InvalidRequest(
                "expected a heart rate record".to_string(),
            )),
        }
    }

    fn read_payload(
        &self,
        common: RecordCommon,
        time: RecordTime,
        _row: &RowValues,
    ) -> Result<Record, PulseError> {
        Ok(Record::HeartRate {
            common,
            time,
            samples: Vec::new(),
        })
    }

    fn child_table_requests(&self) -> Vec<CreateTableRequest> {
        vec![CreateTableRequest::new(
            SERIES_TABLE,
            vec![
                (PRIMARY_COLUMN, ColumnType::PrimaryAutoincrement),
                (PARENT_UUID_COLUMN, ColumnType::Text),
                (SAMPLE_TIME_COLUMN, ColumnType::Integer),
                (BPM_COLUMN, ColumnType::Integer),
            ],
        )
        .add_foreign_key(PARENT_UUID_COLUMN, HEART_RATE_TABLE, UUID_COLUMN, true)]
    }

    fn child_upsert_requests(
        &self,
        record: &Record,
    ) -> Result<(Vec<DeleteTableRequest>, Vec<UpsertTableRequest>), PulseError> {
        let Record::HeartRate { common, samples, .. } = record else {
            return Err(PulseError::InvalidRequest(
                "expected a heart rate record".to_string(),
            ));
        };

        let parent = common.uuid.to_string();
        let clear = vec![DeleteTableRequest::by_parent_uuid(
            SERIES_TABLE,
            PARENT_UUID_COLUMN,
            &parent,
        )];

        let inserts = samples
            .iter()
            .map(|sample| {
                let mut row = RowValues::new();
                row.put_text(PARENT_UUID_COLUMN, &parent);
                row.put_integer(SAMPLE_TIME_COLUMN, sample.time.timestamp_millis());
                row.put_integer(BPM_COLUMN, sample.beats_per_minute);
                UpsertTableRequest::insert_only(SERIES_TABLE, row)
            })
            .collect();

        Ok((clear, inserts))
    }

    fn child_read_request(&self, parent_uuids: &[String]) -> Option<ReadTableRequest> {
        if parent_uuids.is_empty() {
            return None;
        }
        Some(
            ReadTableRequest::new(SERIES_TABLE)
                .with_columns(vec![
                    PARENT_UUID_COLUMN.to_string(),
                    SAMPLE_TIME_COLUMN.to_string(),
                    BPM_COLUMN.to_string(),
                ])
                .with_where(WhereClauses::new().and_in_text(PARENT_UUID_COLUMN, parent_uuids))
                .with_order_by(OrderByClause::new().and_order_by(SAMPLE_TIME_COLUMN, true)),
        )
    }

    fn child_row_columns(&self) -> Vec<(&'static str, ColumnType)> {
        vec![
            (PARENT_UUID_COLUMN, ColumnType::Text),
            (SAMPLE_TIME_COLUMN, ColumnType::Integer),
            (BPM_COLUMN, ColumnType::Integer),
        ]
    }

    fn apply_child_rows(
        &self,
        records: &mut [Record],
        rows: &[RowValues],
    ) -> Result<(), PulseError> {
        let mut by_parent: HashMap<String, &mut Vec<HeartRateSample>> = HashMap::new();
        for record in records.iter_mut() {
            if let Record::HeartRate { common, samples, .. } = record {
                by_parent.insert(common.uuid.to_string(), samples);
            }
        }

        for row in rows {
            let parent = row.text(PARENT_UUID_COLUMN)?;
            let Some(samples) = by_parent.get_mut(parent) else {
                // A sample for a record outside this page; skip it.
                continue;
            };
            samples.push(HeartRateSample {
                time: millis_to_datetime(row.integer(SAMPLE_TIME_COLUMN)?)?,
                beats_per_minute: row.integer(BPM_COLUMN)?,
            });
        }

        Ok(())
    }

    fn aggregate_params(&self, aggregation: AggregationKind) -> Option<AggregateParams> {
        let result_type = match aggregation {
            AggregationKind::Average => AggregateResultType::Double,
            AggregationKind::Min | AggregationKind::Max => AggregateResultType::Long,
            AggregationKind::Sum => return None,
        };
        Some(AggregateParams {
            value_column: format!("{SERIES_TABLE}.{BPM_COLUMN}"),
            time_column: format!("{HEART_RATE_TABLE}.{START_TIME_COLUMN}"),
            join: Some(self.series_join()),
            result_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use pulse_core::{RecordingMethod, TimeRange};
    use uuid::Uuid;

    fn heart_rate_record(bpm: &[i64]) -> Record {
        Record::HeartRate {
            common: RecordCommon {
                uuid: Uuid::new_v4(),
                package_name: "com.example.tracker".to_string(),
                device_id: "chest-strap".to_string(),
                last_modified: DateTime::from_timestamp_millis(99_000).unwrap(),
                client_record_id: None,
                client_record_version: None,
                recording_method: RecordingMethod::ActivelyRecorded,
            },
            time: RecordTime::Interval {
                start: DateTime::from_timestamp_millis(10_000).unwrap(),
                end: DateTime::from_timestamp_millis(20_000).unwrap(),
                start_zone_offset_secs: 0,
                end_zone_offset_secs: 0,
            },
            samples: bpm
                .iter()
                .enumerate()
                .map(|(i, value)| HeartRateSample {
                    time: DateTime::from_timestamp_millis(10_000 + i as i64 * 1_000).unwrap(),
                    beats_per_minute: *value,
                })
                .collect(),
        }
    }

    #[test]
    fn upsert_clears_then_reinserts_samples() {
        let record = heart_rate_record(&[60, 62, 61]);
        let request = HeartRateTable.upsert_request(&record, 1, 1).unwrap();

        assert_eq!(request.child_clear().len(), 1);
        assert!(request.child_clear()[0]
            .statement()
            .starts_with("DELETE FROM heart_rate_record_series_table"));
        assert_eq!(request.child_requests().len(), 3);
        assert_eq!(
            request.child_requests()[1].row().integer("beats_per_minute").unwrap(),
            62
        );
    }

    #[test]
    fn child_rows_attach_to_their_parent() {
        let record = heart_rate_record(&[]);
        let uuid = record.common().uuid.to_string();
        let mut records = vec![record];

        let mut row = RowValues::new();
        row.put_text("parent_uuid", &uuid);
        row.put_integer("sample_time", 11_000);
        row.put_integer("beats_per_minute", 70);

        let mut stray = RowValues::new();
        stray.put_text("parent_uuid", "someone-else");
        stray.put_integer("sample_time", 11_000);
        stray.put_integer("beats_per_minute", 180);

        HeartRateTable
            .apply_child_rows(&mut records, &[row, stray])
            .unwrap();

        let Record::HeartRate { samples, .. } = &records[0] else {
            panic!("not a heart rate record");
        };
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].beats_per_minute, 70);
    }

    #[test]
    fn aggregation_joins_the_series_table() {
        let range = TimeRange::new(
            DateTime::from_timestamp_millis(0).unwrap(),
            DateTime::from_timestamp_millis(100_000).unwrap(),
        )
        .unwrap();
        let request = HeartRateTable
            .aggregate_table_request(AggregationKind::Average, &[4], &range)
            .unwrap();

        let sql = request.aggregate_statement();
        assert!(sql.contains("AVG(heart_rate_record_series_table.beats_per_minute)"));
        assert!(sql.contains(
            "INNER JOIN heart_rate_record_series_table ON heart_rate_record_table.uuid = \
             heart_rate_record_series_table.parent_uuid"
        ));
        assert!(sql.contains("heart_rate_record_table.app_info_id IN (4)"));
        assert!(sql.contains("heart_rate_record_table.start_time >= 0"));
    }

    #[test]
    fn sum_is_unsupported_for_heart_rate() {
        let range = TimeRange::new(
            DateTime::from_timestamp_millis(0).unwrap(),
            DateTime::from_timestamp_millis(1).unwrap(),
        )
        .unwrap();
        let err = HeartRateTable
            .aggregate_table_request(AggregationKind::Sum, &[], &range)
            .unwrap_err();
        assert!(matches!(err, PulseError::UnsupportedAggregation { .. }));
    }
}
