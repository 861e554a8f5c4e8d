//! Step-count records: an interval plus the number of steps taken in it.
//! Sums are priority-sensitive: two trackers logging the same walk must
//! not double the day's total.

use crate::sql::{ColumnType, RowValues};
use crate::table::{AggregateParams, RecordTableDef, TimeShape, START_TIME_COLUMN};
use pulse_core::{
    AggregateResultType, AggregationKind, PulseError, Record, RecordCommon, RecordKind, RecordTime,
};

pub const STEPS_TABLE: &str = "steps_record_table";
pub const COUNT_COLUMN: &str = "count";

pub struct StepsTable;

impl RecordTableDef for StepsTable {
    fn kind(&self) -> RecordKind {
        RecordKind::Steps
    }

    fn table_name(&self) -> &'static str {
        STEPS_TABLE
    }

    fn time_shape(&self) -> TimeShape {
        TimeShape::Interval
    }

    fn extension_columns(&self) -> Vec<(&'static str, ColumnType)> {
        vec![(COUNT_COLUMN, ColumnType::Integer)]
    }

    fn write_payload(&self, record: &Record, row: &mut RowValues) -> Result<(), PulseError> {
        match record {
            Record::Steps { count, .. } => {
                row.put_integer(COUNT_COLUMN, *count);
                Ok(())
            }
            _ => Err(PulseError::InvalidRequest(
                "expected a steps record".to_string(),
            )),
        }
    }

    fn read_payload(
        &self,
        common: RecordCommon,
        time: RecordTime,
        row: &RowValues,
    ) -> Result<Record, PulseError> {
        Ok(Record::Steps {
            common,
            time,
            count: row.integer(COUNT_COLUMN)?,
        })
    }

    fn aggregate_params(&self, aggregation: AggregationKind) -> Option<AggregateParams> {
        match aggregation {
            AggregationKind::Sum => Some(AggregateParams {
                value_column: COUNT_COLUMN.to_string(),
                time_column: START_TIME_COLUMN.to_string(),
                join: None,
                result_type: AggregateResultType::Long,
            }),
            _ => None,
        }
    }

    fn supports_priority(&self, aggregation: AggregationKind) -> bool {
        aggregation == AggregationKind::Sum
    }
}
