use crate::sql::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub referenced_table: String,
    pub referenced_column: &'static str,
    pub on_delete_cascade: bool,
}

/// A secondary unique index, created as its own statement. `predicate`
/// makes it partial (e.g. only rows with a client record id present).
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueIndex {
    pub name: String,
    pub columns: Vec<&'static str>,
    pub predicate: Option<&'static str>,
}

/// Pure description of a table to create: base plus extension columns,
/// foreign keys to the identity tables, and any child tables. Rendering is
/// `CREATE TABLE IF NOT EXISTS`, so applying it to an initialized store is
/// harmless.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableRequest {
    table_name: String,
    columns: Vec<(&'static str, ColumnType)>,
    foreign_keys: Vec<ForeignKey>,
    unique_indexes: Vec<UniqueIndex>,
    child_tables: Vec<CreateTableRequest>,
}

impl CreateTableRequest {
    pub fn new(table_name: &str, columns: Vec<(&'static str, ColumnType)>) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns,
            foreign_keys: Vec::new(),
            unique_indexes: Vec::new(),
            child_tables: Vec::new(),
        }
    }

    pub fn add_foreign_key(
        mut self,
        column: &'static str,
        referenced_table: &str,
        referenced_column: &'static str,
        on_delete_cascade: bool,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column,
            referenced_table: referenced_table.to_string(),
            referenced_column,
            on_delete_cascade,
        });
        self
    }

    pub fn add_unique_index(
        mut self,
        name: &str,
        columns: Vec<&'static str>,
        predicate: Option<&'static str>,
    ) -> Self {
        self.unique_indexes.push(UniqueIndex {
            name: name.to_string(),
            columns,
            predicate,
        });
        self
    }

    pub fn with_child_tables(mut self, child_tables: Vec<CreateTableRequest>) -> Self {
        self.child_tables = child_tables;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[(&'static str, ColumnType)] {
        &self.columns
    }

    pub fn child_tables(&self) -> &[CreateTableRequest] {
        &self.child_tables
    }

    fn create_statement(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {}", ty.sql()))
            .collect();

        for fk in &self.foreign_keys {
            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.referenced_table, fk.referenced_column
            );
            if fk.on_delete_cascade {
                clause.push_str(" ON DELETE CASCADE");
            }
            parts.push(clause);
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table_name,
            parts.join(", ")
        )
    }

    fn index_statements(&self) -> Vec<String> {
        self.unique_indexes
            .iter()
            .map(|index| {
                let mut sql = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                    index.name,
                    self.table_name,
                    index.columns.join(", ")
                );
                if let Some(predicate) = index.predicate {
                    sql.push_str(&format!(" WHERE {predicate}"));
                }
                sql
            })
            .collect()
    }

    /// All statements for this table and its children, parents first so
    /// child foreign keys resolve.
    pub fn statements(&self) -> Vec<String> {
        let mut statements = vec![self.create_statement()];
        statements.extend(self.index_statements());
        for child in &self.child_tables {
            statements.extend(child.statements());
        }
        statements
    }
}
