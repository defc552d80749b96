//! Table metadata cache
//!
//! Column metadata is read from the system catalog the first time a table is
//! touched and kept for the lifetime of the cache. There is no invalidation.
//!
//! Each table key owns a [`OnceCell`], so concurrent first accesses to the
//! same table share a single catalog lookup. A failed lookup leaves the cell
//! empty and the next caller tries again.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use relstore_core::domain::{Canon, ColumnSpec, StoreError, TableSpec};
use relstore_core::ports::Row;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Something that can run the catalog query for a table
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns one catalog row per column of `schema.table`
    async fn fetch_columns(&self, schema: &str, table: &str) -> Result<Vec<Row>, StoreError>;
}

/// Per-table column metadata, keyed by physical table name
#[derive(Debug, Default)]
pub struct MetadataCache {
    tables: DashMap<String, Arc<OnceCell<Arc<TableSpec>>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata of the canon's table, loading it on first use.
    ///
    /// # Errors
    ///
    /// `TableNotFound` when the catalog has no usable columns for the table,
    /// or whatever the source fails with.
    pub async fn get_table<S>(
        &self,
        source: &S,
        schema: &str,
        canon: &Canon,
    ) -> Result<Arc<TableSpec>, StoreError>
    where
        S: CatalogSource + ?Sized,
    {
        let table = canon.table_name();
        let name = table.as_str();
        self.get_or_load(name, move || async move {
            let rows = source.fetch_columns(schema, name).await?;
            table_spec_from_rows(schema, name, &rows)
        })
        .await
    }

    async fn get_or_load<F, Fut>(&self, table: &str, load: F) -> Result<Arc<TableSpec>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TableSpec, StoreError>>,
    {
        let cell = self.tables.entry(table.to_string()).or_default().clone();

        if let Some(spec) = cell.get() {
            debug!(table, "Metadata cache hit");
            return Ok(Arc::clone(spec));
        }

        let spec = cell
            .get_or_try_init(move || async move {
                let spec = load().await?;
                debug!(
                    table,
                    columns = spec.columns.len(),
                    "Loaded table metadata"
                );
                Ok::<_, StoreError>(Arc::new(spec))
            })
            .await?;
        Ok(Arc::clone(spec))
    }

    /// Returns the cached metadata of a table without loading it
    pub fn cached(&self, table: &str) -> Option<Arc<TableSpec>> {
        self.tables
            .get(table)
            .and_then(|cell| cell.get().cloned())
    }

    /// Names of the tables whose metadata is loaded, sorted
    pub fn cached_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

/// Builds a [`TableSpec`] from catalog rows.
///
/// Rows with an empty column name are skipped. When the table and schema
/// columns are absent the requested names are used.
pub fn table_spec_from_rows(
    schema: &str,
    table: &str,
    rows: &[Row],
) -> Result<TableSpec, StoreError> {
    let mut spec = TableSpec::new(schema, table);

    for row in rows {
        let column_name = text(row, "COLUMN_NAME");
        if column_name.is_empty() {
            warn!(table, "Skipping catalog row without a column name");
            continue;
        }

        if let Some(name) = row.get("SCHEMA_NAME").and_then(Value::as_str) {
            spec.schema_name = name.to_string();
        }
        if let Some(name) = row.get("TABLE_NAME").and_then(Value::as_str) {
            spec.table_name = name.to_string();
        }

        let data_type_name = text(row, "DATA_TYPE_NAME");
        let length = match integer(row, "LENGTH") {
            0 => declared_length(&data_type_name),
            n => n,
        };

        spec.push_column(ColumnSpec {
            column_name,
            data_type: integer(row, "DATA_TYPE_ID"),
            data_type_name,
            length,
            is_nullable: nullable(row.get("NULLABLE")),
        });
    }

    if spec.is_empty() {
        return Err(StoreError::TableNotFound {
            schema: schema.to_string(),
            table: table.to_string(),
        });
    }
    Ok(spec)
}

fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn integer(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// `NULLABLE` is 0/1 on most catalogs, `TRUE`/`FALSE` text on some
fn nullable(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64() != Some(0),
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !matches!(s.trim().to_ascii_uppercase().as_str(), "FALSE" | "0"),
        _ => true,
    }
}

/// Length from a declared type such as `VARCHAR(64)`
fn declared_length(type_name: &str) -> i64 {
    type_name
        .split_once('(')
        .and_then(|(_, rest)| rest.split(|c: char| c == ')' || c == ',').next())
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or_default()
}
