//! relstore CLI - Command-line interface for relstore
//!
//! Provides commands for:
//! - Describing a table's column metadata
//! - Loading, listing, saving and removing entities

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relstore_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    describe::DescribeCommand,
    entity::{ListCommand, LoadCommand, RemoveCommand, SaveCommand},
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "relstore", version, about = "Entity store over relational databases")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the column metadata of a table
    Describe(DescribeCommand),
    /// Print the first entity matching a query
    Load(LoadCommand),
    /// Print every entity matching a query
    List(ListCommand),
    /// Insert or update an entity
    Save(SaveCommand),
    /// Remove one matching entity, or all with --all
    Remove(RemoveCommand),
}

/// Loads the configuration: an explicit path must exist, the default path
/// falls back to defaults.
fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let path = PathBuf::from(path);
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(Config::load_or_default(&Config::default_path())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Setup tracing
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = match cli.command {
        Commands::Describe(cmd) => cmd.execute(&config, format).await,
        Commands::Load(cmd) => cmd.execute(&config, format).await,
        Commands::List(cmd) => cmd.execute(&config, format).await,
        Commands::Save(cmd) => cmd.execute(&config, format).await,
        Commands::Remove(cmd) => cmd.execute(&config, format).await,
    };

    if let Err(err) = result {
        get_formatter(format).error(&failure_message(&err));
        std::process::exit(1);
    }
    Ok(())
}

/// One-line failure text with the whole context chain, outermost first
fn failure_message(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["relstore", "-vv", "--json", "list", "shop/product"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_failure_message_keeps_context_chain() {
        let err = anyhow::anyhow!("connect ECONNREFUSED").context("Failed to connect to database");
        assert_eq!(
            failure_message(&err),
            "Failed to connect to database: connect ECONNREFUSED"
        );
    }

    #[test]
    fn test_explicit_config_must_exist() {
        assert!(load_config(Some("/nonexistent/relstore.yaml")).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection:\n  database: \"sqlite::memory:\"\nlogging:\n  level: debug").unwrap();
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.connection.database.as_deref(), Some("sqlite::memory:"));
    }
}
