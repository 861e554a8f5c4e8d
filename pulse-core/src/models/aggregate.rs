//! Aggregation vocabulary: what to compute, over which window, and how the
//! numeric result decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
    Average,
    Min,
    Max,
}

impl AggregationKind {
    pub fn sql_function(&self) -> &'static str {
        match self {
            AggregationKind::Sum => "SUM",
            AggregationKind::Average => "AVG",
            AggregationKind::Min => "MIN",
            AggregationKind::Max => "MAX",
        }
    }
}

/// Declared by a record kind's aggregate parameters; drives result decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateResultType {
    Long,
    Double,
    DurationMillis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateValue {
    Long(i64),
    Double(f64),
    DurationMillis(i64),
}

/// An aggregation answer: `value` is `None` when no rows matched the window.
/// The zone offset is the representative offset callers use to place the
/// result on a local-day axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutcome {
    pub value: Option<AggregateValue>,
    pub zone_offset_secs: Option<i32>,
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn contains_millis(&self, t: i64) -> bool {
        t >= self.start_millis() && t < self.end_millis()
    }
}
