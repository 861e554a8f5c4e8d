use crate::sql::ColumnType;

/// Add-column schema upgrade. Upgrades are additive only: the store may
/// already hold rows from the previous schema, so columns are never removed
/// or retyped.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableRequest {
    table_name: String,
    columns: Vec<(&'static str, ColumnType)>,
}

impl AlterTableRequest {
    pub fn new(table_name: &str, columns: Vec<(&'static str, ColumnType)>) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[(&'static str, ColumnType)] {
        &self.columns
    }

    pub fn add_columns_statement(&self) -> String {
        let adds: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("ADD COLUMN IF NOT EXISTS {name} {}", ty.sql()))
            .collect();
        format!("ALTER TABLE {} {}", self.table_name, adds.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_statement_for_all_columns() {
        let request = AlterTableRequest::new(
            "steps_record_table",
            vec![("recording_method", ColumnType::Integer)],
        );
        assert_eq!(
            request.add_columns_statement(),
            "ALTER TABLE steps_record_table ADD COLUMN IF NOT EXISTS recording_method BIGINT"
        );
    }
}
