//! Domain types
//!
//! This module contains the core data types of relstore:
//! - Entities and canonical names
//! - Queries with their reserved directives
//! - Table metadata
//! - Store error types

pub mod entity;
pub mod errors;
pub mod query;
pub mod table;

// Re-export commonly used types
pub use entity::{Canon, Entity, Fields, ID_FIELD};
pub use errors::StoreError;
pub use query::{Query, Sort, SortOrder};
pub use table::{ColumnSpec, TableSpec};
