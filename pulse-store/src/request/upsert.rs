use crate::request::DeleteTableRequest;
use crate::sql::RowValues;

/// Insert-or-overwrite of one row, keyed by a unique column. Child requests
/// (series samples and the like) are plain inserts; their previous rows are
/// cleared first via `child_clear`, so a re-upsert replaces children
/// wholesale rather than merging.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertTableRequest {
    table_name: String,
    row: RowValues,
    conflict_column: Option<&'static str>,
    child_clear: Vec<DeleteTableRequest>,
    child_requests: Vec<UpsertTableRequest>,
}

impl UpsertTableRequest {
    pub fn new(table_name: &str, row: RowValues, conflict_column: &'static str) -> Self {
        Self {
            table_name: table_name.to_string(),
            row,
            conflict_column: Some(conflict_column),
            child_clear: Vec::new(),
            child_requests: Vec::new(),
        }
    }

    /// A plain insert with no conflict handling, used for child rows,
    /// which are always cleared before re-insert.
    pub fn insert_only(table_name: &str, row: RowValues) -> Self {
        Self {
            table_name: table_name.to_string(),
            row,
            conflict_column: None,
            child_clear: Vec::new(),
            child_requests: Vec::new(),
        }
    }

    pub fn with_child_clear(mut self, child_clear: Vec<DeleteTableRequest>) -> Self {
        self.child_clear = child_clear;
        self
    }

    pub fn with_child_requests(mut self, child_requests: Vec<UpsertTableRequest>) -> Self {
        self.child_requests = child_requests;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn row(&self) -> &RowValues {
        &self.row
    }

    pub fn child_clear(&self) -> &[DeleteTableRequest] {
        &self.child_clear
    }

    pub fn child_requests(&self) -> &[UpsertTableRequest] {
        &self.child_requests
    }

    pub fn statement(&self) -> String {
        let columns: Vec<&str> = self.row.columns().collect();
        let values: Vec<String> = self.row.iter().map(|(_, value)| value.render()).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name,
            columns.join(", "),
            values.join(", ")
        );

        if let Some(conflict_column) = self.conflict_column {
            let updates: Vec<String> = columns
                .iter()
                .filter(|column| **column != conflict_column)
                .map(|column| format!("{column} = EXCLUDED.{column}"))
                .collect();
            sql.push_str(&format!(
                " ON CONFLICT ({conflict_column}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }

        sql
    }
}
