//! Query criteria
//!
//! A [`Query`] is a set of `field = value` filters plus the reserved
//! directives `sort$`, `limit$`, `skip$` and `all$`. Directive keys are
//! parsed out at construction; any other `$`-suffixed key is dropped.

use serde_json::Value;

use super::entity::{is_directive, Fields, ID_FIELD};
use super::errors::StoreError;

pub const SORT_DIRECTIVE: &str = "sort$";
pub const LIMIT_DIRECTIVE: &str = "limit$";
pub const SKIP_DIRECTIVE: &str = "skip$";
pub const ALL_DIRECTIVE: &str = "all$";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Negative weights sort descending, anything else ascending
    pub fn from_weight(weight: f64) -> Self {
        if weight < 0.0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Single-key sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// Filter criteria and directives for load, list and remove
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Fields,
    sort: Option<Sort>,
    limit: Option<u64>,
    skip: Option<u64>,
    all: bool,
}

impl Query {
    /// Creates an empty query (matches every row)
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a `{ id: <id> }` filter
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().filter(ID_FIELD, id.into())
    }

    /// Builds a query from a raw field map, extracting directives.
    ///
    /// Only the first key of `sort$` is honored. `limit$` and `skip$` must be
    /// positive integers to take effect; zero is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidEntity` for malformed directive values.
    pub fn from_fields(raw: Fields) -> Result<Self, StoreError> {
        let mut query = Self::new();
        for (key, value) in raw {
            match key.as_str() {
                SORT_DIRECTIVE => query.sort = parse_sort(&value)?,
                LIMIT_DIRECTIVE => query.limit = parse_count(LIMIT_DIRECTIVE, &value)?,
                SKIP_DIRECTIVE => query.skip = parse_count(SKIP_DIRECTIVE, &value)?,
                ALL_DIRECTIVE => query.all = parse_flag(&value),
                k if is_directive(k) => {}
                _ => {
                    query.filters.insert(key, value);
                }
            }
        }
        Ok(query)
    }

    /// Builds a query from JSON. A bare string or number is an id lookup;
    /// `null` is the empty query.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidEntity` for arrays, booleans or malformed
    /// directive values.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Self::from_fields(map),
            Value::Null => Ok(Self::new()),
            id @ (Value::String(_) | Value::Number(_)) => Ok(Self::by_id(id)),
            other => Err(StoreError::InvalidEntity(format!(
                "unsupported query value: {}",
                other
            ))),
        }
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = (skip > 0).then_some(skip);
        self
    }

    /// Marks the query as applying to every matching row (bulk delete)
    #[must_use]
    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    pub fn filters(&self) -> &Fields {
        &self.filters
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn is_all(&self) -> bool {
        self.all
    }
}

fn parse_sort(value: &Value) -> Result<Option<Sort>, StoreError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(map.iter().next().map(|(field, weight)| Sort {
            field: field.clone(),
            order: SortOrder::from_weight(weight.as_f64().unwrap_or(1.0)),
        })),
        other => Err(StoreError::InvalidEntity(format!(
            "{} must be an object, got {}",
            SORT_DIRECTIVE, other
        ))),
    }
}

fn parse_count(directive: &str, value: &Value) -> Result<Option<u64>, StoreError> {
    let count = match value {
        Value::Null => None,
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match (value, count) {
        (Value::Null, _) => Ok(None),
        (_, Some(n)) => Ok((n > 0).then_some(n)),
        (other, None) => Err(StoreError::InvalidEntity(format!(
            "{} must be a non-negative integer, got {}",
            directive, other
        ))),
    }
}

fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Query {
        Query::from_json(value).unwrap()
    }

    #[test]
    fn test_directives_are_extracted() {
        let q = parse(json!({
            "name": "apple",
            "sort$": {"price": -1, "name": 1},
            "limit$": 10,
            "skip$": 5,
            "all$": true,
            "fields$": ["name"],
        }));

        assert_eq!(q.filters().len(), 1);
        assert_eq!(q.filters().get("name"), Some(&json!("apple")));
        assert_eq!(
            q.sort(),
            Some(&Sort {
                field: "price".into(),
                order: SortOrder::Descending
            })
        );
        assert_eq!(q.limit_value(), Some(10));
        assert_eq!(q.skip_value(), Some(5));
        assert!(q.is_all());
    }

    #[test]
    fn test_zero_limit_is_absent() {
        let q = parse(json!({"limit$": 0, "skip$": 0}));
        assert_eq!(q.limit_value(), None);
        assert_eq!(q.skip_value(), None);
    }

    #[test]
    fn test_invalid_limit_rejected() {
        assert!(Query::from_json(json!({"limit$": -3})).is_err());
        assert!(Query::from_json(json!({"limit$": "ten"})).is_err());
        assert!(Query::from_json(json!({"sort$": "name"})).is_err());
    }

    #[test]
    fn test_scalar_query_is_id_lookup() {
        let q = parse(json!("abc"));
        assert_eq!(q.filters().get("id"), Some(&json!("abc")));

        let q = parse(json!(null));
        assert!(q.filters().is_empty());
    }

    #[test]
    fn test_builder() {
        let q = Query::new()
            .filter("kind", json!("fruit"))
            .sort_by("name", SortOrder::Ascending)
            .limit(3)
            .skip(1);
        assert_eq!(q.sort().map(|s| s.order), Some(SortOrder::Ascending));
        assert_eq!(q.limit_value(), Some(3));
        assert_eq!(q.skip_value(), Some(1));
        assert!(!q.is_all());
    }
}
