//! Database driver ports (driven/secondary ports)
//!
//! A driver supplies two things: an [`IConnector`] that opens connections
//! and knows the engine's catalog query, and the [`ISqlConnection`] it
//! returns, which executes plain SQL text.
//!
//! ## Design Notes
//!
//! - SQL is sent as text with every value already escaped and inlined.
//!   There is no parameter binding at this boundary.
//! - Drivers report failures as [`DriverError`] with a coarse
//!   [`DriverErrorKind`]; the adapter decides which kinds are transient.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::domain::Fields;

/// One result row: column name → value, in select order
pub type Row = Fields;

/// Coarse classification of a driver failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The server actively refused the connection
    ConnectionRefused,
    /// The handle is not (or no longer) connected
    NotConnected,
    /// No open connection was available to run the statement
    NoOpenConnections,
    /// Anything else: syntax errors, constraint violations, bad credentials
    Other,
}

/// Error reported by a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Other, message)
    }

    pub fn not_connected() -> Self {
        Self::new(DriverErrorKind::NotConnected, "notConnected")
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DriverError {}

/// Parameters used to open a connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Target schema; empty means the engine default
    pub schema: String,
    /// Database locator for file or URL based engines
    pub database: Option<String>,
}

impl From<&ConnectionConfig> for ConnectionParams {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone().unwrap_or_default(),
            schema: config.schema.clone().unwrap_or_default(),
            database: config.database.clone(),
        }
    }
}

/// A live connection that executes SQL text
#[async_trait::async_trait]
pub trait ISqlConnection: Send + Sync {
    /// Executes one statement and returns its rows (empty for DML)
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Closes the connection; later `execute` calls fail with `NotConnected`
    async fn close(&self) -> Result<(), DriverError>;
}

/// Factory for connections to one database engine
#[async_trait::async_trait]
pub trait IConnector: Send + Sync {
    /// Opens a new connection
    async fn connect(&self, params: &ConnectionParams)
        -> Result<Arc<dyn ISqlConnection>, DriverError>;

    /// Driver name for logging
    fn name(&self) -> &'static str;

    /// Catalog query returning one row per column of `schema.table`.
    ///
    /// Rows must expose `SCHEMA_NAME`, `TABLE_NAME`, `COLUMN_NAME`,
    /// `DATA_TYPE_ID`, `DATA_TYPE_NAME`, `LENGTH` and `NULLABLE` (0/1).
    /// The default targets the `SYS.TABLE_COLUMNS` system view.
    fn catalog_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT * FROM SYS.TABLE_COLUMNS WHERE SCHEMA_NAME='{}' AND TABLE_NAME='{}'",
            schema.replace('\'', "''"),
            table.replace('\'', "''")
        )
    }
}
