//! Connection factory and catalog dialect for SQLite

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relstore_core::ports::{ConnectionParams, DriverError, IConnector, ISqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::ConnectOptions;
use tracing::{debug, info};

use crate::connection::SqliteSqlConnection;
use crate::SqliteError;

/// Locator used when no database is configured
pub const IN_MEMORY: &str = "sqlite::memory:";

/// Schema SQLite calls the primary database
const DEFAULT_SCHEMA: &str = "main";

/// Opens SQLite connections
///
/// The database locator is taken from `ConnectionParams::database`:
/// - `sqlite:` URLs are passed to sqlx as is (`sqlite::memory:` included)
/// - anything else is a file path, created with its parent directories and
///   opened in WAL mode
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    busy_timeout: Duration,
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn options(&self, database: &str) -> Result<SqliteConnectOptions, SqliteError> {
        let options = if database.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database)
                .map_err(|e| SqliteError::OpenFailed(format!("Invalid database URL {}: {}", database, e)))?
        } else {
            let path = Path::new(database);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SqliteError::OpenFailed(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        Ok(options.busy_timeout(self.busy_timeout))
    }
}

#[async_trait]
impl IConnector for SqliteConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn ISqlConnection>, DriverError> {
        let database = params.database.as_deref().unwrap_or(IN_MEMORY);
        debug!(database, "Opening SQLite connection");

        let connection = self
            .options(database)?
            .connect()
            .await
            .map_err(|e| match SqliteError::from(e) {
                SqliteError::QueryFailed(message) => SqliteError::OpenFailed(format!(
                    "Failed to open database at {}: {}",
                    database, message
                )),
                other => other,
            })?;

        info!(database, "SQLite connection opened");
        Ok(Arc::new(SqliteSqlConnection::new(connection)))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    /// Column metadata through `pragma_table_info`, shaped like the
    /// `SYS.TABLE_COLUMNS` catalog view.
    fn catalog_query(&self, schema: &str, table: &str) -> String {
        let schema = if schema.is_empty() { DEFAULT_SCHEMA } else { schema };
        let schema = schema.replace('\'', "''");
        let table = table.replace('\'', "''");
        format!(
            "SELECT '{schema}' AS SCHEMA_NAME, '{table}' AS TABLE_NAME, name AS COLUMN_NAME, \
             cid AS DATA_TYPE_ID, type AS DATA_TYPE_NAME, 0 AS LENGTH, \
             CASE WHEN \"notnull\" = 1 OR pk > 0 THEN 0 ELSE 1 END AS NULLABLE \
             FROM pragma_table_info('{table}', '{schema}') ORDER BY cid"
        )
    }
}
