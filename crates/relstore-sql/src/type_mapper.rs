//! Column type rules
//!
//! Maps database column type names to a [`TypeKind`], and uses the kind to
//! decide three things: whether a column may appear in a WHERE filter, how an
//! application value is rendered as a SQL literal, and how a fetched value is
//! turned back into an application value.
//!
//! Literals produced here are the text that goes *between* single quotes;
//! the statement builder adds the quotes.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use relstore_core::domain::StoreError;
use serde_json::{Number, Value};

/// Family a column type belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    String,
    /// CLOB-like text that engines refuse to compare
    LargeText,
    Integer,
    Decimal,
    Boolean,
    /// Date and time types; numbers are epoch milliseconds
    Temporal,
    Binary,
}

impl TypeKind {
    /// Whether columns of this kind may be used in an equality filter
    pub fn is_filterable(self) -> bool {
        !matches!(self, TypeKind::LargeText | TypeKind::Binary)
    }
}

const BUILTIN_TYPES: &[(&str, TypeKind)] = &[
    ("VARCHAR", TypeKind::String),
    ("NVARCHAR", TypeKind::String),
    ("ALPHANUM", TypeKind::String),
    ("SHORTTEXT", TypeKind::String),
    ("CHAR", TypeKind::String),
    ("NCHAR", TypeKind::String),
    ("TEXT", TypeKind::String),
    ("CLOB", TypeKind::LargeText),
    ("NCLOB", TypeKind::LargeText),
    ("TINYINT", TypeKind::Integer),
    ("SMALLINT", TypeKind::Integer),
    ("INT", TypeKind::Integer),
    ("INTEGER", TypeKind::Integer),
    ("BIGINT", TypeKind::Integer),
    ("DECIMAL", TypeKind::Decimal),
    ("SMALLDECIMAL", TypeKind::Decimal),
    ("NUMERIC", TypeKind::Decimal),
    ("REAL", TypeKind::Decimal),
    ("DOUBLE", TypeKind::Decimal),
    ("DOUBLE PRECISION", TypeKind::Decimal),
    ("FLOAT", TypeKind::Decimal),
    ("BOOLEAN", TypeKind::Boolean),
    ("DATE", TypeKind::Temporal),
    ("TIME", TypeKind::Temporal),
    ("SECONDDATE", TypeKind::Temporal),
    ("TIMESTAMP", TypeKind::Temporal),
    ("DATETIME", TypeKind::Temporal),
    ("BLOB", TypeKind::Binary),
    ("VARBINARY", TypeKind::Binary),
    ("BINARY", TypeKind::Binary),
];

/// Normalizes a catalog type name: trimmed, uppercased, `(length)` removed.
///
/// `nvarchar(255)` becomes `NVARCHAR`.
pub fn normalize_type_name(type_name: &str) -> String {
    let base = match type_name.find('(') {
        Some(idx) => &type_name[..idx],
        None => type_name,
    };
    base.trim().to_ascii_uppercase()
}

/// Doubles single quotes so `text` is safe inside a quoted literal
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Column type registry with literal and hydration rules
#[derive(Debug, Clone)]
pub struct TypeMapper {
    kinds: HashMap<String, TypeKind>,
}

impl Default for TypeMapper {
    fn default() -> Self {
        let kinds = BUILTIN_TYPES
            .iter()
            .map(|(name, kind)| ((*name).to_string(), *kind))
            .collect();
        Self { kinds }
    }
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or overrides) the kind of a type name
    pub fn register(&mut self, type_name: &str, kind: TypeKind) {
        self.kinds.insert(normalize_type_name(type_name), kind);
    }

    pub fn kind_of(&self, type_name: &str) -> Option<TypeKind> {
        self.kinds.get(&normalize_type_name(type_name)).copied()
    }

    /// True if columns of `type_name` may appear in a WHERE filter
    pub fn is_allowed(&self, type_name: &str) -> bool {
        self.kind_of(type_name)
            .map(TypeKind::is_filterable)
            .unwrap_or(false)
    }

    /// Renders `value` as the literal text for a column of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::TypeMapping` when the type is unknown or the
    /// value cannot be represented in a column of that kind.
    pub fn to_sql(&self, type_name: &str, value: &Value) -> Result<String, StoreError> {
        let kind = self
            .kind_of(type_name)
            .ok_or_else(|| StoreError::type_mapping(type_name, "unsupported column type"))?;

        if value.is_null() {
            return Err(StoreError::type_mapping(type_name, "null has no literal form"));
        }

        match kind {
            TypeKind::String | TypeKind::LargeText => Ok(untyped_literal(value)),
            TypeKind::Integer => integer_literal(type_name, value),
            TypeKind::Decimal => decimal_literal(type_name, value),
            TypeKind::Boolean => boolean_literal(type_name, value),
            TypeKind::Temporal => temporal_literal(type_name, value),
            TypeKind::Binary => match value {
                Value::String(s) => Ok(escape_literal(s)),
                other => Err(StoreError::type_mapping(
                    type_name,
                    format!("expected a string, got {}", json_kind(other)),
                )),
            },
        }
    }

    /// Converts a fetched column value back into an application value.
    ///
    /// Values that do not fit the expected shape are returned unchanged.
    pub fn from_sql(&self, type_name: &str, value: Value) -> Value {
        match (self.kind_of(type_name), value) {
            (Some(TypeKind::Boolean), Value::Number(n)) => match n.as_f64() {
                Some(f) => Value::Bool(f != 0.0),
                None => Value::Number(n),
            },
            (Some(TypeKind::Boolean), Value::String(s)) => {
                match s.trim().to_ascii_uppercase().as_str() {
                    "TRUE" | "1" => Value::Bool(true),
                    "FALSE" | "0" => Value::Bool(false),
                    _ => Value::String(s),
                }
            }
            (Some(TypeKind::Decimal), Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(s)),
            (Some(TypeKind::Integer), Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(s),
            },
            (_, value) => value,
        }
    }
}

/// Literal for a value whose column type is unknown: strings escaped,
/// numbers and booleans verbatim, containers as JSON text.
pub fn untyped_literal(value: &Value) -> String {
    match value {
        Value::String(s) => escape_literal(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => escape_literal(&value.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn integer_literal(type_name: &str, value: &Value) -> Result<String, StoreError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.is_finite() => whole_f64_to_i64(f)
                .map(|i| i.to_string())
                .ok_or_else(|| StoreError::type_mapping(type_name, format!("{n} is out of range"))),
            _ => Err(StoreError::type_mapping(type_name, format!("{n} is not an integer"))),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| i.to_string())
            .map_err(|_| StoreError::type_mapping(type_name, format!("'{s}' is not an integer"))),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        other => Err(StoreError::type_mapping(
            type_name,
            format!("expected an integer, got {}", json_kind(other)),
        )),
    }
}

/// `f` as an i64, or `None` when it lies outside the i64 range
fn whole_f64_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn decimal_literal(type_name: &str, value: &Value) -> Result<String, StoreError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<f64>()
                .map(|_| trimmed.to_string())
                .map_err(|_| StoreError::type_mapping(type_name, format!("'{s}' is not a number")))
        }
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        other => Err(StoreError::type_mapping(
            type_name,
            format!("expected a number, got {}", json_kind(other)),
        )),
    }
}

fn boolean_literal(type_name: &str, value: &Value) -> Result<String, StoreError> {
    let flag = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                return Err(StoreError::type_mapping(
                    type_name,
                    format!("'{s}' is not a boolean"),
                ))
            }
        },
        other => {
            return Err(StoreError::type_mapping(
                type_name,
                format!("expected a boolean, got {}", json_kind(other)),
            ))
        }
    };
    Ok(if flag { "1" } else { "0" }.to_string())
}

fn temporal_literal(type_name: &str, value: &Value) -> Result<String, StoreError> {
    match value {
        Value::String(s) => Ok(escape_literal(s)),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_f64_to_i64))
                .ok_or_else(|| StoreError::type_mapping(type_name, format!("{n} is out of range")))?;
            let instant = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| {
                    StoreError::type_mapping(type_name, format!("{millis} is not a valid instant"))
                })?;
            let format = match normalize_type_name(type_name).as_str() {
                "DATE" => "%Y-%m-%d",
                "TIME" => "%H:%M:%S",
                "SECONDDATE" => "%Y-%m-%d %H:%M:%S",
                _ => "%Y-%m-%d %H:%M:%S%.3f",
            };
            Ok(instant.format(format).to_string())
        }
        other => Err(StoreError::type_mapping(
            type_name,
            format!("expected a date string or epoch milliseconds, got {}", json_kind(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name("nvarchar(255)"), "NVARCHAR");
        assert_eq!(normalize_type_name(" Decimal (10,2)"), "DECIMAL");
        assert_eq!(normalize_type_name("TEXT"), "TEXT");
    }

    #[test]
    fn test_allowed_types() {
        let mapper = TypeMapper::new();
        assert!(mapper.is_allowed("NVARCHAR"));
        assert!(mapper.is_allowed("integer"));
        assert!(mapper.is_allowed("BOOLEAN"));
        assert!(!mapper.is_allowed("NCLOB"));
        assert!(!mapper.is_allowed("BLOB"));
        assert!(!mapper.is_allowed("ST_GEOMETRY"));
    }

    #[test]
    fn test_string_literal_doubles_quotes() {
        let mapper = TypeMapper::new();
        let literal = mapper.to_sql("VARCHAR", &json!("O'Brien")).unwrap();
        assert_eq!(literal, "O''Brien");
    }

    #[test]
    fn test_string_column_serializes_containers() {
        let mapper = TypeMapper::new();
        let literal = mapper.to_sql("NVARCHAR", &json!({"k": "it's"})).unwrap();
        assert_eq!(literal, r#"{"k":"it''s"}"#);
    }

    #[test]
    fn test_numbers_pass_through() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.to_sql("INTEGER", &json!(42)).unwrap(), "42");
        assert_eq!(mapper.to_sql("DECIMAL", &json!(1.5)).unwrap(), "1.5");
        assert_eq!(mapper.to_sql("VARCHAR", &json!(7)).unwrap(), "7");
    }

    #[test]
    fn test_integer_rejects_incompatible_values() {
        let mapper = TypeMapper::new();
        assert!(mapper.to_sql("INTEGER", &json!({"a": 1})).is_err());
        assert!(mapper.to_sql("INTEGER", &json!("abc")).is_err());
        assert!(mapper.to_sql("INTEGER", &json!(1.25)).is_err());
        assert_eq!(mapper.to_sql("INTEGER", &json!(" 12 ")).unwrap(), "12");
    }

    #[test]
    fn test_integer_out_of_range_floats() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.to_sql("BIGINT", &json!(2.0)).unwrap(), "2");
        assert!(matches!(
            mapper.to_sql("BIGINT", &json!(1e20)),
            Err(StoreError::TypeMapping { .. })
        ));
        assert!(mapper.to_sql("BIGINT", &json!(-1e20)).is_err());
        assert!(mapper.to_sql("TIMESTAMP", &json!(1e20)).is_err());
    }

    #[test]
    fn test_unsupported_type_is_an_error() {
        let mapper = TypeMapper::new();
        let err = mapper.to_sql("ST_POINT", &json!("x")).unwrap_err();
        assert!(matches!(err, StoreError::TypeMapping { .. }));
    }

    #[test]
    fn test_boolean_literals() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.to_sql("BOOLEAN", &json!(true)).unwrap(), "1");
        assert_eq!(mapper.to_sql("BOOLEAN", &json!(false)).unwrap(), "0");
        assert_eq!(mapper.to_sql("BOOLEAN", &json!("TRUE")).unwrap(), "1");
        assert!(mapper.to_sql("BOOLEAN", &json!("maybe")).is_err());
    }

    #[test]
    fn test_temporal_from_epoch_millis() {
        let mapper = TypeMapper::new();
        let ts = mapper.to_sql("TIMESTAMP", &json!(0)).unwrap();
        assert_eq!(ts, "1970-01-01 00:00:00.000");
        let date = mapper.to_sql("DATE", &json!(86_400_000)).unwrap();
        assert_eq!(date, "1970-01-02");
        let text = mapper.to_sql("DATE", &json!("2024-05-01")).unwrap();
        assert_eq!(text, "2024-05-01");
    }

    #[test]
    fn test_binary_accepts_strings_only() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.to_sql("BLOB", &json!("ab'c")).unwrap(), "ab''c");
        assert!(mapper.to_sql("BLOB", &json!(1)).is_err());
    }

    #[test]
    fn test_register_custom_type() {
        let mut mapper = TypeMapper::new();
        assert!(!mapper.is_allowed("CITEXT"));
        mapper.register("citext", TypeKind::String);
        assert!(mapper.is_allowed("CITEXT"));
        assert_eq!(mapper.to_sql("CITEXT", &json!("a")).unwrap(), "a");
    }

    #[test]
    fn test_hydration() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.from_sql("BOOLEAN", json!(1)), json!(true));
        assert_eq!(mapper.from_sql("BOOLEAN", json!(0)), json!(false));
        assert_eq!(mapper.from_sql("BOOLEAN", json!("FALSE")), json!(false));
        assert_eq!(mapper.from_sql("DECIMAL", json!("12.50")), json!(12.5));
        assert_eq!(mapper.from_sql("INTEGER", json!("7")), json!(7));
        assert_eq!(mapper.from_sql("VARCHAR", json!("7")), json!("7"));
        assert_eq!(mapper.from_sql("DECIMAL", json!("n/a")), json!("n/a"));
    }

    #[test]
    fn test_untyped_literal() {
        assert_eq!(untyped_literal(&json!("a'b")), "a''b");
        assert_eq!(untyped_literal(&json!(true)), "true");
        assert_eq!(untyped_literal(&json!([1, 2])), "[1,2]");
    }
}
