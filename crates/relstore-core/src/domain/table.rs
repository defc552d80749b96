//! Table metadata
//!
//! A [`TableSpec`] is the cached view of one table's columns as reported by
//! the database's system catalog.

use serde::{Deserialize, Serialize};

/// Metadata for a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub column_name: String,
    /// Engine-specific numeric type id
    pub data_type: i64,
    /// Type name as reported by the catalog, e.g. `NVARCHAR`
    pub data_type_name: String,
    pub length: i64,
    pub is_nullable: bool,
}

/// Schema name, table name and the ordered column set of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column, replacing any earlier column with the same name
    pub fn push_column(&mut self, column: ColumnSpec) {
        match self
            .columns
            .iter_mut()
            .find(|c| c.column_name == column.column_name)
        {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Looks up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.column_name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, type_name: &str) -> ColumnSpec {
        ColumnSpec {
            column_name: name.to_string(),
            data_type: 0,
            data_type_name: type_name.to_string(),
            length: 0,
            is_nullable: true,
        }
    }

    #[test]
    fn test_push_and_lookup() {
        let mut spec = TableSpec::new("APP", "product");
        spec.push_column(column("id", "NVARCHAR"));
        spec.push_column(column("price", "INTEGER"));

        assert!(spec.has_column("price"));
        assert!(!spec.has_column("PRICE"));
        assert_eq!(spec.column_names().collect::<Vec<_>>(), vec!["id", "price"]);
    }

    #[test]
    fn test_push_replaces_duplicate() {
        let mut spec = TableSpec::new("APP", "product");
        spec.push_column(column("price", "INTEGER"));
        spec.push_column(column("price", "DECIMAL"));

        assert_eq!(spec.columns.len(), 1);
        assert_eq!(spec.column("price").unwrap().data_type_name, "DECIMAL");
    }
}
