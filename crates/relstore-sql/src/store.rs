//! `IEntityStore` implementation over SQL text
//!
//! Each operation follows the same path: resolve the table metadata, build
//! the statement, execute it through the [`ConnectionManager`], and hydrate
//! the returned rows into entities.
//!
//! ## Limitations
//!
//! - Removing a single entity is a SELECT followed by a DELETE that matches
//!   the filterable columns of the selected row, or its `id` when there are
//!   none. The two statements are not atomic.

use std::sync::Arc;

use relstore_core::config::Config;
use relstore_core::domain::{Canon, Entity, Query, StoreError, TableSpec};
use relstore_core::ports::{ConnectionParams, IConnector, IEntityStore, ISqlConnection, Row};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lifecycle::{ConnectionManager, ConnectionState};
use crate::metadata::MetadataCache;
use crate::statement::StatementBuilder;
use crate::type_mapper::TypeMapper;

/// Entity store backed by a relational database
#[derive(Debug)]
pub struct SqlEntityStore {
    manager: ConnectionManager,
    metadata: MetadataCache,
    mapper: TypeMapper,
}

impl SqlEntityStore {
    /// Creates a store without connecting. Call [`SqlEntityStore::configure`]
    /// before use.
    pub fn new(connector: Arc<dyn IConnector>, config: &Config) -> Self {
        let params = ConnectionParams::from(&config.connection);
        Self {
            manager: ConnectionManager::new(connector, params, &config.reconnect),
            metadata: MetadataCache::new(),
            mapper: TypeMapper::new(),
        }
    }

    /// Creates a store and connects it
    ///
    /// # Errors
    ///
    /// See [`ConnectionManager::configure`].
    pub async fn open(connector: Arc<dyn IConnector>, config: &Config) -> Result<Self, StoreError> {
        let store = Self::new(connector, config);
        store.configure().await?;
        Ok(store)
    }

    /// Replaces the type rules, e.g. to register engine-specific types
    #[must_use]
    pub fn with_mapper(mut self, mapper: TypeMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub async fn configure(&self) -> Result<(), StoreError> {
        self.manager.configure().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn schema(&self) -> &str {
        self.manager.schema()
    }

    /// Column metadata for the canon's table, loaded on first use
    pub async fn table_spec(&self, canon: &Canon) -> Result<Arc<TableSpec>, StoreError> {
        self.metadata
            .get_table(&self.manager, self.manager.schema(), canon)
            .await
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.mapper)
    }

    async fn run(&self, table: &str, sql: &str) -> Result<Vec<Row>, StoreError> {
        debug!(table, sql, "Executing statement");
        self.manager.execute(sql).await
    }

    fn hydrate(&self, template: &Entity, spec: &TableSpec, row: Row) -> Entity {
        let fields = row
            .into_iter()
            .map(|(column, value)| {
                let value = match spec.column(&column) {
                    Some(c) => self.mapper.from_sql(&c.data_type_name, value),
                    None => value,
                };
                (column, value)
            })
            .collect();
        template.make(fields)
    }

    fn new_identity(entity: &Entity) -> Result<Value, StoreError> {
        match entity.id_hint() {
            Some(hint @ (Value::String(_) | Value::Number(_))) => Ok(hint.clone()),
            Some(other) => Err(StoreError::IdentityGeneration(format!(
                "id$ must be a string or a number, got {}",
                other
            ))),
            None => Ok(Value::String(Uuid::new_v4().to_string())),
        }
    }

    /// Reads the saved row back by id.
    ///
    /// A missing row after an UPDATE means the id matched nothing and is an
    /// error; after an INSERT the caller's entity is returned.
    async fn reload(&self, entity: &Entity, spec: &TableSpec, updated: bool) -> Result<Entity, StoreError> {
        let Some(id) = entity.id() else {
            return Ok(entity.clone());
        };
        let sql = self.builder().select(&Query::by_id(id.clone()), spec)?;
        let rows = self.run(&spec.table_name, &sql).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(self.hydrate(entity, spec, row)),
            None if updated => Err(StoreError::InvalidEntity(format!(
                "no row with id {} in {}",
                id, spec.table_name
            ))),
            None => {
                warn!(table = %spec.table_name, id = %id, "Saved row could not be read back");
                Ok(entity.clone())
            }
        }
    }
}

#[async_trait::async_trait]
impl IEntityStore for SqlEntityStore {
    async fn save(&self, entity: &mut Entity) -> Result<Entity, StoreError> {
        let spec = self.table_spec(entity.canon()).await?;

        let updated = entity.has_identity();
        if updated {
            let sql = self.builder().update(entity, &spec)?;
            self.run(&spec.table_name, &sql).await?;
            debug!(table = %spec.table_name, "Updated entity");
        } else {
            let id = Self::new_identity(entity)?;
            entity.set_id(id);
            let sql = self.builder().insert(entity, &spec)?;
            self.run(&spec.table_name, &sql).await?;
            debug!(table = %spec.table_name, "Inserted entity");
        }

        self.reload(entity, &spec, updated).await
    }

    async fn load(&self, query_entity: &Entity, query: &Query) -> Result<Option<Entity>, StoreError> {
        let spec = self.table_spec(query_entity.canon()).await?;
        let sql = self.builder().select(query, &spec)?;
        let rows = self.run(&spec.table_name, &sql).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| self.hydrate(query_entity, &spec, row)))
    }

    async fn list(&self, query_entity: &Entity, query: &Query) -> Result<Vec<Entity>, StoreError> {
        let spec = self.table_spec(query_entity.canon()).await?;
        let sql = self.builder().select(query, &spec)?;
        let rows = self.run(&spec.table_name, &sql).await?;
        debug!(table = %spec.table_name, count = rows.len(), "Listed entities");
        Ok(rows
            .into_iter()
            .map(|row| self.hydrate(query_entity, &spec, row))
            .collect())
    }

    async fn remove(&self, query_entity: &Entity, query: &Query) -> Result<(), StoreError> {
        let spec = self.table_spec(query_entity.canon()).await?;

        if query.is_all() {
            let sql = self.builder().delete(query.filters(), &spec)?;
            self.run(&spec.table_name, &sql).await?;
            info!(table = %spec.table_name, "Removed all matching entities");
            return Ok(());
        }

        let sql = self.builder().select(query, &spec)?;
        let rows = self.run(&spec.table_name, &sql).await?;
        let Some(row) = rows.into_iter().next() else {
            debug!(table = %spec.table_name, "Nothing to remove");
            return Ok(());
        };

        let sql = self.builder().delete_row(&row, &spec)?;
        self.run(&spec.table_name, &sql).await?;
        debug!(table = %spec.table_name, "Removed entity");
        Ok(())
    }

    fn native(&self) -> Option<Arc<dyn ISqlConnection>> {
        self.manager.connection()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.manager.close().await
    }
}
