//! A single SQLite connection behind the `ISqlConnection` port
//!
//! Statements are serialized through a mutex; SQLite connections are not
//! shareable across concurrent statements.

use async_trait::async_trait;
use relstore_core::ports::{DriverError, ISqlConnection, Row};
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::debug;

use crate::SqliteError;

/// Open SQLite connection; `None` once closed
pub struct SqliteSqlConnection {
    inner: Mutex<Option<SqliteConnection>>,
}

impl std::fmt::Debug for SqliteSqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSqlConnection").finish_non_exhaustive()
    }
}

impl SqliteSqlConnection {
    pub fn new(connection: SqliteConnection) -> Self {
        Self {
            inner: Mutex::new(Some(connection)),
        }
    }
}

#[async_trait]
impl ISqlConnection for SqliteSqlConnection {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        let mut guard = self.inner.lock().await;
        let connection = guard.as_mut().ok_or(SqliteError::NotConnected)?;

        let rows = sqlx::query(sql)
            .fetch_all(&mut *connection)
            .await
            .map_err(SqliteError::from)?;
        debug!(rows = rows.len(), "SQLite statement executed");

        rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()
            .map_err(DriverError::from)
    }

    async fn close(&self) -> Result<(), DriverError> {
        let connection = self.inner.lock().await.take();
        if let Some(connection) = connection {
            connection.close().await.map_err(SqliteError::from)?;
        }
        Ok(())
    }
}

/// Converts a row into column → JSON value, using the storage class of
/// each value (SQLite is dynamically typed per value, not per column).
fn decode_row(row: &SqliteRow) -> Result<Row, SqliteError> {
    let mut fields = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => Number::from_f64(row.try_get_unchecked::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(
                    String::from_utf8_lossy(&row.try_get_unchecked::<Vec<u8>, _>(idx)?).into_owned(),
                ),
                _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        fields.insert(column.name().to_string(), value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use relstore_core::ports::{ConnectionParams, DriverErrorKind, IConnector};
    use serde_json::json;

    use super::*;
    use crate::SqliteConnector;

    async fn memory() -> std::sync::Arc<dyn ISqlConnection> {
        SqliteConnector::new()
            .connect(&ConnectionParams::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_decodes_storage_classes() {
        let conn = memory().await;
        let rows = conn
            .execute("SELECT 1 AS i, 2.5 AS r, 'x' AS t, NULL AS n, x'6869' AS b")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            serde_json::Value::Object(rows[0].clone()),
            json!({"i": 1, "r": 2.5, "t": "x", "n": null, "b": "hi"})
        );
    }

    #[tokio::test]
    async fn test_ddl_returns_no_rows() {
        let conn = memory().await;
        let rows = conn.execute("CREATE TABLE t (id TEXT)").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_syntax_error_is_not_transient() {
        let conn = memory().await;
        let err = conn.execute("SELEKT nonsense").await.unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Other);
    }

    #[tokio::test]
    async fn test_closed_connection_reports_not_connected() {
        let conn = memory().await;
        conn.close().await.unwrap();
        let err = conn.execute("SELECT 1").await.unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::NotConnected);
    }
}
