pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::PulseConfig;
pub use error::PulseError;
pub use models::aggregate::{
    AggregateOutcome, AggregateValue, AggregateResultType, AggregationKind, TimeRange,
};
pub use models::page::PageToken;
pub use models::record::{Record, RecordCommon, RecordKind, RecordTime, RecordingMethod};
pub use models::request::{AggregateRecordsRequest, ReadRecordsPage, ReadRecordsRequest};
