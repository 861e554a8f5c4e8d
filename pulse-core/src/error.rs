use crate::models::aggregate::AggregationKind;
use crate::models::record::RecordKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The named owning app has no surrogate key in the store. Surfaced to
    /// the caller so "no data for a known app" and "app not recognized"
    /// stay distinguishable.
    #[error("Unknown app: {0}")]
    UnknownApp(String),

    /// The (record kind, aggregation) pair has no aggregate parameters.
    /// A caller-contract error, never retried.
    #[error("{kind:?} records do not support {aggregation:?} aggregation")]
    UnsupportedAggregation {
        kind: RecordKind,
        aggregation: AggregationKind,
    },

    /// A stored row could not be reconstructed into its domain record.
    #[error("Row decode failed: {0}")]
    Decode(String),

    /// Schema upgrade failure. Fatal to store initialization; no partial
    /// state is recovered.
    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Record {0} is owned by a different app")]
    OwnershipMismatch(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
