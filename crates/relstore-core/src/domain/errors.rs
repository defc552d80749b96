//! Store error types
//!
//! Every CRUD operation resolves to exactly one `Result<_, StoreError>`.
//! Only [`StoreError::Connection`] is transient; everything else is surfaced
//! to the caller without retry.

use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The connection is lost or was never established (transient)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store could not be configured (fatal)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The system catalog has no columns for the canonical table
    #[error("Metadata not found for table: {schema}.{table}")]
    TableNotFound {
        /// Schema that was searched
        schema: String,
        /// Physical table name derived from the entity canon
        table: String,
    },

    /// A value cannot be safely serialized for its column type
    #[error("Cannot map value for type {type_name}: {message}")]
    TypeMapping {
        /// Column type name as reported by the catalog
        type_name: String,
        /// What went wrong
        message: String,
    },

    /// No identity could be produced or found for the entity
    #[error("Error getting \"id\" value: {0}")]
    IdentityGeneration(String),

    /// The database rejected a statement (constraint violation, syntax, ...)
    #[error("Query failed: {0}")]
    Query(String),

    /// Entity or query input is malformed
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),
}

impl StoreError {
    /// Returns true if the error is a connection-loss signal that the
    /// reconnect loop may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }

    /// Builds a [`StoreError::TypeMapping`] from anything printable.
    pub fn type_mapping(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::TypeMapping {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::TableNotFound {
            schema: "APP".to_string(),
            table: "sys_user".to_string(),
        };
        assert_eq!(err.to_string(), "Metadata not found for table: APP.sys_user");

        let err = StoreError::type_mapping("ST_POINT", "unsupported column type");
        assert_eq!(
            err.to_string(),
            "Cannot map value for type ST_POINT: unsupported column type"
        );
    }

    #[test]
    fn test_only_connection_errors_are_transient() {
        assert!(StoreError::Connection("refused".into()).is_transient());
        assert!(!StoreError::Configuration("bad host".into()).is_transient());
        assert!(!StoreError::Query("unique constraint violated".into()).is_transient());
        assert!(!StoreError::IdentityGeneration("empty".into()).is_transient());
    }
}
