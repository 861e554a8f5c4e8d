//! Page tokens for resumable reads.
//!
//! A token packs the resume timestamp and the sort direction into one `i64`
//! so callers can treat it as opaque: `time_millis << 1 | direction_bit`,
//! direction bit 0 for ascending. The anchor timestamp is the start time of
//! the first group the previous page did not return, so resuming re-fetches
//! that whole group.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    pub time_millis: i64,
    pub ascending: bool,
}

impl PageToken {
    pub fn new(time_millis: i64, ascending: bool) -> Self {
        Self {
            time_millis,
            ascending,
        }
    }

    pub fn encode(&self) -> i64 {
        (self.time_millis << 1) | if self.ascending { 0 } else { 1 }
    }

    /// Decodes a raw token. Negative raw values are rejected (timestamps in
    /// this store are non-negative epoch millis).
    pub fn decode(raw: i64) -> Option<Self> {
        if raw < 0 {
            return None;
        }
        Some(Self {
            time_millis: raw >> 1,
            ascending: raw & 1 == 0,
        })
    }
}
