//! Describe command - Show the column metadata of a table
//!
//! Provides the `relstore describe <canon>` CLI command, which resolves the
//! canon to its physical table and prints what the system catalog reports.

use anyhow::{Context, Result};
use clap::Args;
use relstore_core::config::Config;
use relstore_core::domain::{Canon, TableSpec};
use relstore_core::ports::IEntityStore;
use tracing::info;

use super::open_store;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DescribeCommand {
    /// Entity canon: `name`, `base/name` or `zone/base/name`
    pub canon: String,
}

impl DescribeCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let canon: Canon = self.canon.parse().context("Invalid canon")?;

        let store = open_store(config).await?;
        info!(canon = %canon, table = %canon.table_name(), "Describing table");
        let spec = store.table_spec(&canon).await;
        store.close().await.context("Failed to close store")?;
        let spec = spec.with_context(|| format!("Failed to describe {}", canon))?;

        if format.is_json() {
            let json = serde_json::to_value(spec.as_ref())
                .context("Failed to serialize table metadata")?;
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("{} ({})", canon, qualified_name(&spec)));
        formatter.info("");
        for line in column_lines(&spec) {
            formatter.info(&line);
        }
        Ok(())
    }
}

fn qualified_name(spec: &TableSpec) -> String {
    if spec.schema_name.is_empty() {
        spec.table_name.clone()
    } else {
        format!("{}.{}", spec.schema_name, spec.table_name)
    }
}

/// One line per column: name, type, length and nullability
fn column_lines(spec: &TableSpec) -> Vec<String> {
    let width = spec
        .columns
        .iter()
        .map(|c| c.column_name.len())
        .max()
        .unwrap_or(0)
        .max("COLUMN".len());

    let mut lines = vec![format!("{:width$}  {:<16} {:>6}  NULL", "COLUMN", "TYPE", "LENGTH", width = width)];
    lines.extend(spec.columns.iter().map(|c| {
        format!(
            "{:width$}  {:<16} {:>6}  {}",
            c.column_name,
            c.data_type_name,
            c.length,
            if c.is_nullable { "yes" } else { "no" },
            width = width
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use relstore_core::domain::ColumnSpec;

    use super::*;

    #[test]
    fn test_column_lines() {
        let mut spec = TableSpec::new("main", "shop_product");
        spec.push_column(ColumnSpec {
            column_name: "id".into(),
            data_type: 0,
            data_type_name: "TEXT".into(),
            length: 0,
            is_nullable: false,
        });
        let lines = column_lines(&spec);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("COLUMN"));
        assert!(lines[1].starts_with("id    "));
        assert!(lines[1].ends_with("no"));
        assert_eq!(qualified_name(&spec), "main.shop_product");
    }
}
