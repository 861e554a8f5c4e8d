//! WHERE / ORDER BY / JOIN fragments composed into one logical filter.
//!
//! All three are immutable value objects: builder methods consume `self` and
//! return a new value, so a request under construction never shares mutable
//! state between callers.

use crate::sql::{render_longs_list, render_text_list};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClauses {
    clauses: Vec<String>,
}

impl WhereClauses {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column IN (ids...)`. A no-op when `ids` is empty: an empty filter
    /// means "no restriction", never "match nothing".
    pub fn and_in_longs(mut self, column: &str, ids: &[i64]) -> Self {
        if !ids.is_empty() {
            self.clauses
                .push(format!("{column} IN {}", render_longs_list(ids)));
        }
        self
    }

    pub fn and_in_text(mut self, column: &str, values: &[String]) -> Self {
        if !values.is_empty() {
            self.clauses
                .push(format!("{column} IN {}", render_text_list(values)));
        }
        self
    }

    /// Half-open interval filter: `column >= start AND column < end`.
    pub fn and_between(mut self, column: &str, start_millis: i64, end_millis: i64) -> Self {
        self.clauses
            .push(format!("{column} >= {start_millis} AND {column} < {end_millis}"));
        self
    }

    /// Page-token anchor for ascending reads.
    pub fn and_at_or_after(mut self, column: &str, millis: i64) -> Self {
        self.clauses.push(format!("{column} >= {millis}"));
        self
    }

    /// Page-token anchor for descending reads.
    pub fn and_at_or_before(mut self, column: &str, millis: i64) -> Self {
        self.clauses.push(format!("{column} <= {millis}"));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders `" WHERE a AND b"`, or an empty string when no clause was
    /// added.
    pub fn render(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByClause {
    terms: Vec<(String, bool)>,
}

impl OrderByClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and_order_by(mut self, column: &str, ascending: bool) -> Self {
        self.terms.push((column.to_string(), ascending));
        self
    }

    pub fn render(&self) -> String {
        if self.terms.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(column, ascending)| {
                format!("{column} {}", if *ascending { "ASC" } else { "DESC" })
            })
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlJoin {
    pub join_type: JoinType,
    pub table: String,
    pub self_column: String,
    pub join_column: String,
}

impl SqlJoin {
    pub fn inner(table: &str, self_column: &str, join_column: &str) -> Self {
        Self {
            join_type: JoinType::Inner,
            table: table.to_string(),
            self_column: self_column.to_string(),
            join_column: join_column.to_string(),
        }
    }

    pub fn render(&self) -> String {
        let keyword = match self.join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        };
        format!(
            " {keyword} {} ON {} = {}",
            self.table, self.self_column, self.join_column
        )
    }
}
