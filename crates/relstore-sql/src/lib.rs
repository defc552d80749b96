//! relstore SQL adapter
//!
//! Translates the generic entity CRUD contract into SQL text for a
//! relational engine.
//!
//! ## Architecture
//!
//! This crate implements the `IEntityStore` port from `relstore-core` on top
//! of any driver that provides the `IConnector` / `ISqlConnection` ports. It
//! is a driven (secondary) adapter in the hexagonal architecture: it knows
//! SQL, but not how bytes reach a particular engine.
//!
//! ## Key Components
//!
//! - [`TypeMapper`] - Column type rules for literals, filters and hydration
//! - [`MetadataCache`] - Per-table column metadata, loaded once from the catalog
//! - [`StatementBuilder`] - INSERT / UPDATE / DELETE / SELECT synthesis
//! - [`ConnectionManager`] - Connect, classify failures, reconnect with backoff
//! - [`SqlEntityStore`] - Full `IEntityStore` implementation
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use relstore_core::config::Config;
//! use relstore_core::ports::IConnector;
//! use relstore_sql::SqlEntityStore;
//!
//! # async fn example(connector: Arc<dyn IConnector>) -> anyhow::Result<()> {
//! let store = SqlEntityStore::open(connector, &Config::default()).await?;
//! // Use store as IEntityStore...
//! # Ok(())
//! # }
//! ```

pub mod lifecycle;
pub mod metadata;
pub mod statement;
pub mod store;
pub mod type_mapper;

pub use lifecycle::{Backoff, ConnectionManager, ConnectionState};
pub use metadata::{CatalogSource, MetadataCache};
pub use statement::StatementBuilder;
pub use store::SqlEntityStore;
pub use type_mapper::{TypeKind, TypeMapper};
