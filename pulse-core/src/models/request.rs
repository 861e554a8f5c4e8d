//! Caller-facing read and aggregate requests, plus the paged read response.
//!
//! These are the value types a transport layer would carry; the transport
//! itself lives outside this workspace.

use crate::models::aggregate::{AggregationKind, TimeRange};
use crate::models::record::{Record, RecordKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_ascending() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRecordsRequest {
    pub kind: RecordKind,

    /// Restrict to records owned by these apps. Empty means all apps.
    #[serde(default)]
    pub package_filter: Vec<String>,

    /// Explicit record ids. Mutually exclusive with time-range pagination:
    /// when present, `page_size`/`page_token` are ignored.
    #[serde(default)]
    pub id_filter: Option<Vec<Uuid>>,

    pub time_range: TimeRange,

    #[serde(default)]
    pub page_size: Option<usize>,

    /// Opaque token from a previous page's response.
    #[serde(default)]
    pub page_token: Option<i64>,

    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRecordsPage {
    pub records: Vec<Record>,
    /// Present when more pages remain; resume by passing it back unchanged.
    pub next_page_token: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRecordsRequest {
    pub kind: RecordKind,
    pub aggregation: AggregationKind,
    #[serde(default)]
    pub package_filter: Vec<String>,
    pub time_range: TimeRange,
}
