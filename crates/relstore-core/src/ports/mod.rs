//! Port definitions (hexagonal architecture interfaces)
//!
//! ## Ports Overview
//!
//! - [`IEntityStore`] - The CRUD contract offered to callers
//! - [`IConnector`] - Opens connections and supplies the catalog query
//! - [`ISqlConnection`] - Executes SQL text and returns rows

pub mod connection;
pub mod entity_store;

pub use connection::{
    ConnectionParams, DriverError, DriverErrorKind, IConnector, ISqlConnection, Row,
};
pub use entity_store::IEntityStore;
