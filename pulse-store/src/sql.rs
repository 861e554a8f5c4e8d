//! Column types, SQL values and row maps shared by every request type.
//!
//! Requests render to literal Postgres SQL executed through `sqlx::query`;
//! values carried in a [`RowValues`] are rendered inline with text escaping,
//! the same shape the requests take on the read side when rows are decoded
//! back out of the store.

use pulse_core::PulseError;

/// Column type vocabulary for table creation and row decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `BIGSERIAL PRIMARY KEY`: the surrogate row id.
    PrimaryAutoincrement,
    /// `BIGINT`. All timestamps are epoch millis in this type.
    Integer,
    /// `DOUBLE PRECISION`.
    Real,
    /// Nullable `TEXT`.
    Text,
    /// `TEXT NOT NULL UNIQUE`: the record uuid column.
    TextNotNullUnique,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::PrimaryAutoincrement => "BIGSERIAL PRIMARY KEY",
            ColumnType::Integer => "BIGINT",
            ColumnType::Real => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::TextNotNullUnique => "TEXT NOT NULL UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Renders the value as a SQL literal. Text is single-quoted with
    /// embedded quotes doubled.
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => {
                if v.is_finite() {
                    format!("{v:?}")
                } else {
                    "NULL".to_string()
                }
            }
            SqlValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }
}

/// An ordered column -> value map, used both to build upsert rows and to
/// hold decoded rows coming back from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    values: Vec<(String, SqlValue)>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: &str, value: SqlValue) {
        self.values.push((column.to_string(), value));
    }

    pub fn put_integer(&mut self, column: &str, value: i64) {
        self.put(column, SqlValue::Integer(value));
    }

    pub fn put_real(&mut self, column: &str, value: f64) {
        self.put(column, SqlValue::Real(value));
    }

    pub fn put_text(&mut self, column: &str, value: &str) {
        self.put(column, SqlValue::Text(value.to_string()));
    }

    pub fn put_opt_text(&mut self, column: &str, value: Option<&str>) {
        match value {
            Some(v) => self.put_text(column, v),
            None => self.put(column, SqlValue::Null),
        }
    }

    pub fn put_opt_integer(&mut self, column: &str, value: Option<i64>) {
        match value {
            Some(v) => self.put_integer(column, v),
            None => self.put(column, SqlValue::Null),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn integer(&self, column: &str) -> Result<i64, PulseError> {
        match self.get(column) {
            Some(SqlValue::Integer(v)) => Ok(*v),
            other => Err(decode_mismatch(column, "integer", other)),
        }
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, PulseError> {
        match self.get(column) {
            Some(SqlValue::Integer(v)) => Ok(Some(*v)),
            Some(SqlValue::Null) | None => Ok(None),
            other => Err(decode_mismatch(column, "integer", other)),
        }
    }

    pub fn real(&self, column: &str) -> Result<f64, PulseError> {
        match self.get(column) {
            Some(SqlValue::Real(v)) => Ok(*v),
            Some(SqlValue::Integer(v)) => Ok(*v as f64),
            other => Err(decode_mismatch(column, "real", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<&str, PulseError> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Ok(v),
            other => Err(decode_mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<&str>, PulseError> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Ok(Some(v)),
            Some(SqlValue::Null) | None => Ok(None),
            other => Err(decode_mismatch(column, "text", other)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn decode_mismatch(column: &str, expected: &str, actual: Option<&SqlValue>) -> PulseError {
    PulseError::Decode(format!(
        "column {column}: expected {expected}, found {actual:?}"
    ))
}

/// Renders an in-list of integer literals: `(1, 2, 3)`.
pub fn render_longs_list(values: &[i64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

/// Renders an in-list of text literals, escaped.
pub fn render_text_list(values: &[String]) -> String {
    let parts: Vec<String> = values
        .iter()
        .map(|v| SqlValue::Text(v.clone()).render())
        .collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_render_escapes_quotes() {
        assert_eq!(
            SqlValue::Text("it's".to_string()).render(),
            "'it''s'"
        );
    }

    #[test]
    fn real_render_keeps_fraction() {
        assert_eq!(SqlValue::Real(72.5).render(), "72.5");
        assert_eq!(SqlValue::Real(72.0).render(), "72.0");
    }

    #[test]
    fn non_finite_reals_render_null() {
        assert_eq!(SqlValue::Real(f64::NAN).render(), "NULL");
    }

    #[test]
    fn row_values_typed_getters() {
        let mut row = RowValues::new();
        row.put_integer("count", 42);
        row.put_opt_text("title", None);

        assert_eq!(row.integer("count").unwrap(), 42);
        assert_eq!(row.opt_text("title").unwrap(), None);
        assert_eq!(row.opt_integer("missing").unwrap(), None);
        assert!(row.text("count").is_err());
    }

    #[test]
    fn list_rendering() {
        assert_eq!(render_longs_list(&[1, 2, 3]), "(1, 2, 3)");
        assert_eq!(
            render_text_list(&["a".to_string(), "b'c".to_string()]),
            "('a', 'b''c')"
        );
    }
}
