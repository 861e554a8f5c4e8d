use crate::clause::WhereClauses;

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTableRequest {
    table_name: String,
    where_clauses: WhereClauses,
}

impl DeleteTableRequest {
    pub fn new(table_name: &str, where_clauses: WhereClauses) -> Self {
        Self {
            table_name: table_name.to_string(),
            where_clauses,
        }
    }

    /// Delete by explicit uuid list.
    pub fn by_ids(table_name: &str, uuid_column: &str, uuids: &[String]) -> Self {
        Self::new(
            table_name,
            WhereClauses::new().and_in_text(uuid_column, uuids),
        )
    }

    /// Delete by time window plus optional owning-app filter. Used by the
    /// retention sweep; no per-row ownership check beyond the filter.
    pub fn by_time_and_apps(
        table_name: &str,
        time_column: &str,
        start_millis: i64,
        end_millis: i64,
        app_column: &str,
        app_ids: &[i64],
    ) -> Self {
        Self::new(
            table_name,
            WhereClauses::new()
                .and_in_longs(app_column, app_ids)
                .and_between(time_column, start_millis, end_millis),
        )
    }

    /// Clears child rows for one parent record.
    pub fn by_parent_uuid(table_name: &str, parent_column: &str, parent_uuid: &str) -> Self {
        Self::new(
            table_name,
            WhereClauses::new().and_in_text(parent_column, &[parent_uuid.to_string()]),
        )
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn statement(&self) -> String {
        format!("DELETE FROM {}{}", self.table_name, self.where_clauses.render())
    }
}
