//! Entity store port (driving/primary port)
//!
//! The generic CRUD contract that callers program against. Every method
//! resolves exactly once, with either a value or a [`StoreError`].

use std::sync::Arc;

use crate::domain::{Entity, Query, StoreError};

use super::connection::ISqlConnection;

/// Port trait for entity persistence
///
/// ## Implementation Notes
///
/// - `save` mutates the caller's entity in place when it assigns a new
///   identity, and returns a fresh copy reflecting the persisted row.
///   Updating an id that matches no row is an error.
/// - The query entity passed to `load`, `list` and `remove` only selects the
///   target table through its canon.
/// - `remove` without the `all$` directive removes at most one row.
#[async_trait::async_trait]
pub trait IEntityStore: Send + Sync {
    /// Inserts a new entity or updates an existing one (identity present)
    async fn save(&self, entity: &mut Entity) -> Result<Entity, StoreError>;

    /// Returns the first entity matching `query`, if any
    async fn load(&self, query_entity: &Entity, query: &Query)
        -> Result<Option<Entity>, StoreError>;

    /// Returns every entity matching `query`, in result order
    async fn list(&self, query_entity: &Entity, query: &Query) -> Result<Vec<Entity>, StoreError>;

    /// Removes the matching entity, or every match when `all$` is set
    async fn remove(&self, query_entity: &Entity, query: &Query) -> Result<(), StoreError>;

    /// Raw connection handle for escape-hatch use
    fn native(&self) -> Option<Arc<dyn ISqlConnection>>;

    /// Stops background work and closes the connection
    async fn close(&self) -> Result<(), StoreError>;
}
