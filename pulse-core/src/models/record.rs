//! Domain records persisted by the store.
//!
//! Every record carries the same base metadata ([`RecordCommon`]) and either
//! a single instant or a start/end interval ([`RecordTime`]). Type-specific
//! payloads live on the [`Record`] variants; the closed enum replaces any
//! reflective per-type instantiation; each variant is registered against a
//! table definition at process start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Steps,
    HeartRate,
    SleepSession,
    Weight,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Steps,
        RecordKind::HeartRate,
        RecordKind::SleepSession,
        RecordKind::Weight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Steps => "steps",
            RecordKind::HeartRate => "heart_rate",
            RecordKind::SleepSession => "sleep_session",
            RecordKind::Weight => "weight",
        }
    }
}

/// How the record was captured, stored as an integer-tagged column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMethod {
    Unknown,
    ActivelyRecorded,
    AutomaticallyRecorded,
    ManualEntry,
}

impl RecordingMethod {
    pub fn code(&self) -> i64 {
        match self {
            RecordingMethod::Unknown => 0,
            RecordingMethod::ActivelyRecorded => 1,
            RecordingMethod::AutomaticallyRecorded => 2,
            RecordingMethod::ManualEntry => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RecordingMethod::Unknown),
            1 => Some(RecordingMethod::ActivelyRecorded),
            2 => Some(RecordingMethod::AutomaticallyRecorded),
            3 => Some(RecordingMethod::ManualEntry),
            _ => None,
        }
    }
}

/// Base metadata shared by every record kind.
///
/// `uuid` is unique within the store; `(package_name, client_record_id)` is
/// unique when the client id is present. The owning app and originating
/// device are identified by name here and mapped to surrogate keys at the
/// storage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCommon {
    pub uuid: Uuid,
    pub package_name: String,
    pub device_id: String,
    pub last_modified: DateTime<Utc>,
    pub client_record_id: Option<String>,
    pub client_record_version: Option<i64>,
    pub recording_method: RecordingMethod,
}

/// A record is stamped either at a single instant or over an interval.
/// Zone offsets are kept alongside so aggregation can bucket by local day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTime {
    Instant {
        time: DateTime<Utc>,
        zone_offset_secs: i32,
    },
    Interval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        start_zone_offset_secs: i32,
        end_zone_offset_secs: i32,
    },
}

impl RecordTime {
    /// The timestamp records sort and paginate by: the instant itself, or
    /// the interval start.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            RecordTime::Instant { time, .. } => *time,
            RecordTime::Interval { start, .. } => *start,
        }
    }

    pub fn start_millis(&self) -> i64 {
        self.start().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub time: DateTime<Utc>,
    pub beats_per_minute: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Steps {
        common: RecordCommon,
        time: RecordTime,
        count: i64,
    },
    HeartRate {
        common: RecordCommon,
        time: RecordTime,
        samples: Vec<HeartRateSample>,
    },
    SleepSession {
        common: RecordCommon,
        time: RecordTime,
        title: Option<String>,
    },
    Weight {
        common: RecordCommon,
        time: RecordTime,
        weight_kg: f64,
    },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Steps { .. } => RecordKind::Steps,
            Record::HeartRate { .. } => RecordKind::HeartRate,
            Record::SleepSession { .. } => RecordKind::SleepSession,
            Record::Weight { .. } => RecordKind::Weight,
        }
    }

    pub fn common(&self) -> &RecordCommon {
        match self {
            Record::Steps { common, .. }
            | Record::HeartRate { common, .. }
            | Record::SleepSession { common, .. }
            | Record::Weight { common, .. } => common,
        }
    }

    pub fn time(&self) -> &RecordTime {
        match self {
            Record::Steps { time, .. }
            | Record::HeartRate { time, .. }
            | Record::SleepSession { time, .. }
            | Record::Weight { time, .. } => time,
        }
    }
}
