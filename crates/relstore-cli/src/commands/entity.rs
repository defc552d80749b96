//! Entity commands - load, list, save and remove
//!
//! Queries and entity data are given as JSON. Query objects may carry the
//! `sort$`, `limit$`, `skip$` and `all$` directives; a bare string or number
//! is looked up as an id.

use anyhow::{Context, Result};
use clap::Args;
use relstore_core::config::Config;
use relstore_core::domain::{Canon, Entity, Query};
use relstore_core::ports::IEntityStore;
use relstore_sql::SqlEntityStore;
use tracing::info;

use super::{open_store, parse_json};
use crate::output::{get_formatter, OutputFormat};

/// Canon plus optional query shared by the read commands
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Entity canon: `name`, `base/name` or `zone/base/name`
    pub canon: String,

    /// Query as JSON, e.g. '{"name":"tea","sort$":{"price":-1}}'
    #[arg(long, short)]
    pub query: Option<String>,
}

impl QueryArgs {
    fn resolve(&self) -> Result<(Entity, Query)> {
        let canon: Canon = self.canon.parse().context("Invalid canon")?;
        let query = Query::from_json(parse_json(self.query.as_deref(), "--query")?)
            .context("Invalid query")?;
        Ok((Entity::new(canon), query))
    }
}

/// Runs `op` against a freshly opened store and always closes it
async fn with_store<T, F, Fut>(config: &Config, op: F) -> Result<T>
where
    F: FnOnce(SqlEntityStore) -> Fut,
    Fut: std::future::Future<Output = (SqlEntityStore, Result<T>)>,
{
    let store = open_store(config).await?;
    let (store, result) = op(store).await;
    store.close().await.context("Failed to close store")?;
    result
}

#[derive(Debug, Args)]
pub struct LoadCommand {
    #[command(flatten)]
    pub args: QueryArgs,
}

impl LoadCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let (target, query) = self.args.resolve()?;
        info!(canon = %target.canon(), "Loading entity");

        let found = with_store(config, |store| async move {
            let result = store.load(&target, &query).await.context("Load failed");
            (store, result)
        })
        .await?;

        match found {
            Some(entity) => {
                formatter.success(&format!("Found {}", entity.canon()));
                formatter.entity(&entity);
            }
            None if format.is_json() => formatter.print_json(&serde_json::Value::Null),
            None => formatter.warn("No matching entity"),
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ListCommand {
    #[command(flatten)]
    pub args: QueryArgs,
}

impl ListCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let (target, query) = self.args.resolve()?;
        info!(canon = %target.canon(), "Listing entities");

        let entities = with_store(config, |store| async move {
            let result = store.list(&target, &query).await.context("List failed");
            (store, result)
        })
        .await?;

        if format.is_json() {
            let json: Vec<serde_json::Value> = entities.iter().map(Entity::to_json).collect();
            formatter.print_json(&serde_json::Value::Array(json));
            return Ok(());
        }

        formatter.success(&format!("{} entities", entities.len()));
        for entity in &entities {
            formatter.info("");
            formatter.entity(entity);
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct SaveCommand {
    /// Entity canon: `name`, `base/name` or `zone/base/name`
    pub canon: String,

    /// Entity fields as a JSON object; include "id" to update, "id$" to
    /// force the id of a new entity
    #[arg(long, short)]
    pub data: String,
}

impl SaveCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let canon: Canon = self.canon.parse().context("Invalid canon")?;
        let mut entity = Entity::from_json(canon, parse_json(Some(&self.data), "--data")?)
            .context("Invalid entity")?;
        let updating = entity.has_identity();
        info!(canon = %entity.canon(), updating, "Saving entity");

        let saved = with_store(config, |store| async move {
            let result = store.save(&mut entity).await.context("Save failed");
            (store, result)
        })
        .await?;

        formatter.success(&format!(
            "{} {}",
            if updating { "Updated" } else { "Created" },
            saved.canon()
        ));
        formatter.entity(&saved);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct RemoveCommand {
    #[command(flatten)]
    pub args: QueryArgs,

    /// Remove every matching entity instead of the first one
    #[arg(long)]
    pub all: bool,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let (target, mut query) = self.args.resolve()?;
        if self.all {
            query = query.all(true);
        }
        let bulk = query.is_all();
        info!(canon = %target.canon(), bulk, "Removing entities");

        with_store(config, |store| async move {
            let result = store.remove(&target, &query).await.context("Remove failed");
            (store, result)
        })
        .await?;

        formatter.success(if bulk {
            "Removed all matching entities"
        } else {
            "Removed matching entity (if any)"
        });
        Ok(())
    }
}
