//! relstore SQLite driver
//!
//! Implements the `IConnector` and `ISqlConnection` ports from
//! `relstore-core` over a single sqlx `SqliteConnection`.
//!
//! ## Architecture
//!
//! This is a driven (secondary) adapter. It knows how to reach SQLite and
//! how to describe a table through `pragma_table_info`; statement synthesis
//! lives in `relstore-sql`.
//!
//! ## Key Components
//!
//! - [`SqliteConnector`] - Opens connections, supplies the catalog query
//! - [`SqliteSqlConnection`] - Executes SQL text and decodes rows to JSON
//! - [`SqliteError`] - Driver errors, mapped onto `DriverError`
//!
//! ## Usage
//!
//! ```no_run
//! use relstore_core::ports::{ConnectionParams, IConnector, ISqlConnection};
//! use relstore_sqlite::SqliteConnector;
//!
//! # async fn example() -> Result<(), relstore_core::ports::DriverError> {
//! let params = ConnectionParams {
//!     database: Some("sqlite::memory:".into()),
//!     ..Default::default()
//! };
//! let connection = SqliteConnector::new().connect(&params).await?;
//! connection.execute("CREATE TABLE t (id TEXT PRIMARY KEY)").await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod connector;

pub use connection::SqliteSqlConnection;
pub use connector::SqliteConnector;

use relstore_core::ports::{DriverError, DriverErrorKind};

/// Errors raised by the SQLite driver
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
    /// The database server could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The database could not be opened (bad locator, permissions, ...)
    #[error("Open failed: {0}")]
    OpenFailed(String),

    /// The connection was closed or lost
    #[error("notConnected")]
    NotConnected,

    /// A statement failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl From<sqlx::Error> for SqliteError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
                SqliteError::ConnectionFailed(e.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                SqliteError::NotConnected
            }
            _ => SqliteError::QueryFailed(e.to_string()),
        }
    }
}

impl From<SqliteError> for DriverError {
    fn from(e: SqliteError) -> Self {
        let kind = match &e {
            SqliteError::ConnectionFailed(_) => DriverErrorKind::ConnectionRefused,
            SqliteError::NotConnected => DriverErrorKind::NotConnected,
            SqliteError::OpenFailed(_) | SqliteError::QueryFailed(_) => DriverErrorKind::Other,
        };
        DriverError::new(kind, e.to_string())
    }
}
