//! SQL statement synthesis
//!
//! Pure text building: an entity or query plus the table's metadata in,
//! SQL text out. Nothing here touches a connection.
//!
//! ## Quoting rules
//!
//! - Identifiers are wrapped in double quotes, embedded `"` doubled.
//! - Every value is wrapped in single quotes after conversion through the
//!   [`TypeMapper`], which doubles embedded `'`.
//! - `null` in an INSERT renders as a bare `NULL`.

use relstore_core::domain::entity::is_scalar;
use relstore_core::domain::{Entity, Fields, Query, StoreError, TableSpec, ID_FIELD};
use serde_json::Value;

use crate::type_mapper::{untyped_literal, TypeMapper};

/// Wraps an identifier in double quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Table reference: `"schema"."table"` when a schema is known, else the
/// plain table name
pub fn table_ref(spec: &TableSpec) -> String {
    if spec.schema_name.is_empty() {
        spec.table_name.clone()
    } else {
        format!(
            "{}.{}",
            quote_identifier(&spec.schema_name),
            quote_identifier(&spec.table_name)
        )
    }
}

/// Builds statements using the column rules of a [`TypeMapper`]
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    mapper: &'a TypeMapper,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(mapper: &'a TypeMapper) -> Self {
        Self { mapper }
    }

    /// `INSERT INTO <table> ("a", "b") VALUES ('1', NULL)` over every field
    /// of the entity, in entity order.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` for an entity without fields, `TypeMapping` when a
    /// value does not fit its column.
    pub fn insert(&self, entity: &Entity, spec: &TableSpec) -> Result<String, StoreError> {
        if entity.fields().is_empty() {
            return Err(StoreError::InvalidEntity(format!(
                "nothing to insert into {}",
                spec.table_name
            )));
        }

        let mut columns = Vec::with_capacity(entity.fields().len());
        let mut values = Vec::with_capacity(entity.fields().len());
        for (field, value) in entity.fields() {
            columns.push(quote_identifier(field));
            values.push(if value.is_null() {
                "NULL".to_string()
            } else {
                self.quoted_value(field, value, spec)?
            });
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table_ref(spec),
            columns.join(", "),
            values.join(", ")
        ))
    }

    /// `UPDATE <table> SET "a" = '1' WHERE "id" = '<id>'`, skipping null
    /// fields.
    ///
    /// # Errors
    ///
    /// `IdentityGeneration` when the entity has no identity.
    pub fn update(&self, entity: &Entity, spec: &TableSpec) -> Result<String, StoreError> {
        let id = entity.id().ok_or_else(|| {
            StoreError::IdentityGeneration(format!("update on {} without id", spec.table_name))
        })?;

        let mut assignments = Vec::with_capacity(entity.fields().len());
        for (field, value) in entity.fields() {
            if value.is_null() {
                continue;
            }
            assignments.push(format!(
                "{} = {}",
                quote_identifier(field),
                self.quoted_value(field, value, spec)?
            ));
        }

        Ok(format!(
            "UPDATE {} SET {} WHERE {} = {}",
            table_ref(spec),
            assignments.join(", "),
            quote_identifier(ID_FIELD),
            self.quoted_value(ID_FIELD, id, spec)?
        ))
    }

    /// `DELETE FROM <table>` restricted by `filters`
    pub fn delete(&self, filters: &Fields, spec: &TableSpec) -> Result<String, StoreError> {
        let mut sql = format!("DELETE FROM {}", table_ref(spec));
        sql.push_str(&self.where_clause(filters, spec)?);
        Ok(sql)
    }

    /// `DELETE FROM <table>` matching one fetched row.
    ///
    /// The row's filterable columns scope the statement. When none of them
    /// qualifies the row's `id` is used instead.
    ///
    /// # Errors
    ///
    /// `InvalidEntity` when the row can be scoped neither way. A DELETE
    /// without a WHERE clause is never produced here.
    pub fn delete_row(&self, row: &Fields, spec: &TableSpec) -> Result<String, StoreError> {
        let mut sql = format!("DELETE FROM {}", table_ref(spec));
        let filter = self.where_clause(row, spec)?;
        if !filter.is_empty() {
            sql.push_str(&filter);
            return Ok(sql);
        }

        match row.get(ID_FIELD) {
            Some(id) if is_scalar(id) => {
                sql.push_str(&format!(
                    " WHERE {} = {}",
                    quote_identifier(ID_FIELD),
                    self.quoted_value(ID_FIELD, id, spec)?
                ));
                Ok(sql)
            }
            _ => Err(StoreError::InvalidEntity(format!(
                "row of {} has no column that can identify it",
                spec.table_name
            ))),
        }
    }

    /// `SELECT * FROM <table>` with the query's filters and modifiers
    pub fn select(&self, query: &Query, spec: &TableSpec) -> Result<String, StoreError> {
        let mut sql = format!("SELECT * FROM {}", table_ref(spec));
        sql.push_str(&self.where_clause(query.filters(), spec)?);
        sql.push_str(&modifiers(query));
        Ok(sql)
    }

    /// ` WHERE "a" = '1' AND "b" = '2'`, or an empty string.
    ///
    /// Only scalar values on known columns of a filterable type take part;
    /// everything else is left out.
    pub fn where_clause(&self, filters: &Fields, spec: &TableSpec) -> Result<String, StoreError> {
        let mut clauses = Vec::new();
        for (field, value) in filters {
            if !is_scalar(value) {
                continue;
            }
            let Some(column) = spec.column(field) else {
                continue;
            };
            if !self.mapper.is_allowed(&column.data_type_name) {
                continue;
            }
            let literal = self.mapper.to_sql(&column.data_type_name, value)?;
            clauses.push(format!("{} = '{}'", quote_identifier(field), literal));
        }

        if clauses.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", clauses.join(" AND ")))
        }
    }

    fn quoted_value(&self, field: &str, value: &Value, spec: &TableSpec) -> Result<String, StoreError> {
        let literal = match spec.column(field) {
            Some(column) if self.mapper.kind_of(&column.data_type_name).is_some() => {
                self.mapper.to_sql(&column.data_type_name, value)?
            }
            _ => untyped_literal(value),
        };
        Ok(format!("'{}'", literal))
    }
}

/// ` ORDER BY "f" DESC LIMIT n OFFSET m`; OFFSET only appears with LIMIT
pub fn modifiers(query: &Query) -> String {
    let mut out = String::new();
    if let Some(sort) = query.sort() {
        out.push_str(&format!(
            " ORDER BY {} {}",
            quote_identifier(&sort.field),
            sort.order.as_sql()
        ));
    }
    if let Some(limit) = query.limit_value() {
        out.push_str(&format!(" LIMIT {}", limit));
        if let Some(skip) = query.skip_value() {
            out.push_str(&format!(" OFFSET {}", skip));
        }
    }
    out
}
