//! Body-weight measurements: a single instant and a value in kilograms.

use crate::sql::{ColumnType, RowValues};
use crate::table::{AggregateParams, RecordTableDef, TimeShape, TIME_COLUMN};
use pulse_core::{
    AggregateResultType, AggregationKind, PulseError, Record, RecordCommon, RecordKind, RecordTime,
};

pub const WEIGHT_TABLE: &str = "weight_record_table";
pub const WEIGHT_COLUMN: &str = "weight_kg";

pub struct WeightTable;

impl RecordTableDef for WeightTable {
    fn kind(&self) -> RecordKind {
        RecordKind::Weight
    }

    fn table_name(&self) -> &'static str {
        WEIGHT_TABLE
    }

    fn time_shape(&self) -> TimeShape {
        TimeShape::Instant
    }

    fn extension_columns(&self) -> Vec<(&'static str, ColumnType)> {
        vec![(WEIGHT_COLUMN, ColumnType::Real)]
    }

    fn write_payload(&self, record: &Record, row: &mut RowValues) -> Result<(), PulseError> {
        match record {
            Record::Weight { weight_kg, .. } => {
                row.put_real(WEIGHT_COLUMN, *weight_kg);
                Ok(())
            }
            _ => Err(PulseError::InvalidRequest(
                "expected a weight record".to_string(),
            )),
        }
    }

    fn read_payload(
        &self,
        common: RecordCommon,
        time: RecordTime,
        row: &RowValues,
    ) -> Result<Record, PulseError> {
        Ok(Record::Weight {
            common,
            time,
            weight_kg: row.real(WEIGHT_COLUMN)?,
        })
    }

    fn aggregate_params(&self, aggregation: AggregationKind) -> Option<AggregateParams> {
        match aggregation {
            AggregationKind::Average | AggregationKind::Min | AggregationKind::Max => {
                Some(AggregateParams {
                    value_column: WEIGHT_COLUMN.to_string(),
                    time_column: TIME_COLUMN.to_string(),
                    join: None,
                    result_type: AggregateResultType::Double,
                })
            }
            AggregationKind::Sum => None,
        }
    }
}
