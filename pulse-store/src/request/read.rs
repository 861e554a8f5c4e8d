use crate::clause::{OrderByClause, SqlJoin, WhereClauses};

/// One SELECT against a record table (or its child table): explicit column
/// list, composed filters, optional join, ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTableRequest {
    table_name: String,
    columns: Vec<String>,
    where_clauses: WhereClauses,
    order_by: OrderByClause,
    join: Option<SqlJoin>,
    limit: Option<usize>,
    distinct: bool,
}

impl ReadTableRequest {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: Vec::new(),
            where_clauses: WhereClauses::new(),
            order_by: OrderByClause::new(),
            join: None,
            limit: None,
            distinct: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_where(mut self, where_clauses: WhereClauses) -> Self {
        self.where_clauses = where_clauses;
        self
    }

    pub fn with_order_by(mut self, order_by: OrderByClause) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_join(mut self, join: SqlJoin) -> Self {
        self.join = Some(join);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn statement(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!(
            "SELECT {}{columns} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            self.table_name
        );
        if let Some(join) = &self.join {
            sql.push_str(&join.render());
        }
        sql.push_str(&self.where_clauses.render());
        sql.push_str(&self.order_by.render());
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}
