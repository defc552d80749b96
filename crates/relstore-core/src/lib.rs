//! relstore Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `Entity`, `Canon`, `Query`, `TableSpec`, `StoreError`
//! - **Port definitions** - Traits for adapters: `ISqlConnection`, `IConnector`, `IEntityStore`
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces that the SQL adapter (`relstore-sql`) implements and that
//! database drivers (`relstore-sqlite`) plug into.

pub mod config;
pub mod domain;
pub mod ports;
