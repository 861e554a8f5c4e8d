//! Concrete table definitions, one per record kind, and the registry that
//! maps kind tags to them.

pub mod heart_rate;
pub mod sleep;
pub mod steps;
pub mod weight;

use crate::table::RecordTableDef;
use pulse_core::RecordKind;
use std::collections::HashMap;

pub use heart_rate::HeartRateTable;
pub use sleep::SleepSessionTable;
pub use steps::StepsTable;
pub use weight::WeightTable;

/// Kind -> table definition map, built once at process start by an explicit
/// factory and passed to the store.
pub struct TableRegistry {
    map: HashMap<RecordKind, Box<dyn RecordTableDef>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        let mut map: HashMap<RecordKind, Box<dyn RecordTableDef>> = HashMap::new();
        map.insert(RecordKind::Steps, Box::new(StepsTable));
        map.insert(RecordKind::HeartRate, Box::new(HeartRateTable));
        map.insert(RecordKind::SleepSession, Box::new(SleepSessionTable));
        map.insert(RecordKind::Weight, Box::new(WeightTable));
        Self { map }
    }

    pub fn get(&self, kind: RecordKind) -> Option<&dyn RecordTableDef> {
        self.map.get(&kind).map(|def| def.as_ref())
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn RecordTableDef> {
        self.map.values().map(|def| def.as_ref())
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
