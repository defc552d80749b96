//! CLI subcommands
//!
//! Every command opens its own store from the loaded configuration and
//! closes it before returning.

pub mod describe;
pub mod entity;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use relstore_core::config::Config;
use relstore_core::ports::IConnector;
use relstore_sql::SqlEntityStore;
use relstore_sqlite::SqliteConnector;
use serde_json::Value;

/// Connector for the configured driver name
pub fn connector_for(driver: &str) -> Result<Arc<dyn IConnector>> {
    match driver {
        "sqlite" => Ok(Arc::new(SqliteConnector::new())),
        other => bail!("Unsupported driver '{}' (available: sqlite)", other),
    }
}

/// Validates the configuration and opens a connected store
pub async fn open_store(config: &Config) -> Result<SqlEntityStore> {
    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration: {}", details.join("; "));
    }

    let connector = connector_for(config.connection.driver.trim())?;
    SqlEntityStore::open(connector, config)
        .await
        .context("Failed to connect to database")
}

/// Parses an optional JSON argument; absent means `null`
pub fn parse_json(arg: Option<&str>, what: &str) -> Result<Value> {
    match arg {
        Some(text) => serde_json::from_str(text).with_context(|| format!("Invalid JSON in {}", what)),
        None => Ok(Value::Null),
    }
}
