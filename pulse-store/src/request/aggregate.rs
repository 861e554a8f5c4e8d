use crate::clause::{SqlJoin, WhereClauses};
use pulse_core::{AggregateResultType, AggregationKind};

/// Columns projected alongside the value column when a (record kind,
/// aggregation) pair is priority-sensitive. The executor needs all four to
/// resolve overlapping intervals from different owning apps.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityColumns {
    pub start_time: String,
    pub end_time: String,
    pub app_info_id: String,
    pub last_modified_time: String,
}

/// One aggregation against a record table. Non-priority aggregations render
/// a single SQL aggregate row; priority-sensitive ones render a row fetch
/// whose overlap resolution happens in [`crate::aggregation`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTableRequest {
    table_name: String,
    aggregation: AggregationKind,
    value_column: String,
    time_column: String,
    result_type: AggregateResultType,
    where_clauses: WhereClauses,
    join: Option<SqlJoin>,
    priority_columns: Option<PriorityColumns>,
    zone_offset_column: String,
}

impl AggregateTableRequest {
    pub fn new(
        table_name: &str,
        aggregation: AggregationKind,
        value_column: &str,
        time_column: &str,
        result_type: AggregateResultType,
        zone_offset_column: &str,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            aggregation,
            value_column: value_column.to_string(),
            time_column: time_column.to_string(),
            result_type,
            where_clauses: WhereClauses::new(),
            join: None,
            priority_columns: None,
            zone_offset_column: zone_offset_column.to_string(),
        }
    }

    pub fn with_where(mut self, where_clauses: WhereClauses) -> Self {
        self.where_clauses = where_clauses;
        self
    }

    pub fn with_join(mut self, join: SqlJoin) -> Self {
        self.join = Some(join);
        self
    }

    pub fn with_priority_columns(mut self, columns: PriorityColumns) -> Self {
        self.priority_columns = Some(columns);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn aggregation(&self) -> AggregationKind {
        self.aggregation
    }

    pub fn result_type(&self) -> AggregateResultType {
        self.result_type
    }

    pub fn is_priority(&self) -> bool {
        self.priority_columns.is_some()
    }

    pub fn priority_columns(&self) -> Option<&PriorityColumns> {
        self.priority_columns.as_ref()
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn zone_offset_column(&self) -> &str {
        &self.zone_offset_column
    }

    fn aggregate_cast(&self) -> &'static str {
        match self.result_type {
            AggregateResultType::Long | AggregateResultType::DurationMillis => "BIGINT",
            AggregateResultType::Double => "DOUBLE PRECISION",
        }
    }

    /// Renders the single-row SQL aggregate used by non-priority
    /// aggregations: the aggregate itself plus a representative zone
    /// offset.
    pub fn aggregate_statement(&self) -> String {
        let mut sql = format!(
            "SELECT CAST({}({}) AS {}) AS agg, MIN({}) AS zone_offset FROM {}",
            self.aggregation.sql_function(),
            self.value_column,
            self.aggregate_cast(),
            self.zone_offset_column,
            self.table_name
        );
        if let Some(join) = &self.join {
            sql.push_str(&join.render());
        }
        sql.push_str(&self.where_clauses.render());
        sql
    }

    /// Renders the interval row fetch used by priority-sensitive
    /// aggregations: value column, the four priority columns, and the zone
    /// offset for local-day bucketing.
    pub fn priority_fetch_statement(&self) -> Option<String> {
        let priority = self.priority_columns.as_ref()?;
        let mut sql = format!(
            "SELECT {}, {}, {}, {}, {}, {} FROM {}",
            self.value_column,
            priority.start_time,
            priority.end_time,
            priority.app_info_id,
            priority.last_modified_time,
            self.zone_offset_column,
            self.table_name
        );
        if let Some(join) = &self.join {
            sql.push_str(&join.render());
        }
        sql.push_str(&self.where_clauses.render());
        sql.push_str(&format!(" ORDER BY {} ASC", priority.start_time));
        Some(sql)
    }
}
