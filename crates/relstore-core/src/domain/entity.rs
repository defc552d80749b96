//! Entities and canonical names
//!
//! An [`Entity`] is a loosely-typed record: an ordered map of field name to
//! JSON value, tagged with the [`Canon`] that decides which table it lives in.
//! Keys ending in `$` are directives, never data columns; the constructors
//! strip them, keeping only the `id$` identity hint.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::StoreError;

/// Ordered field map shared by entities, queries and result rows
pub type Fields = serde_json::Map<String, Value>;

/// Name of the identity field
pub const ID_FIELD: &str = "id";

/// Directive carrying a caller-chosen identity for inserts
pub const ID_HINT_DIRECTIVE: &str = "id$";

/// Suffix marking a reserved directive key
pub const DIRECTIVE_SUFFIX: char = '$';

/// Returns true if `key` is a directive rather than a data field
pub fn is_directive(key: &str) -> bool {
    key.ends_with(DIRECTIVE_SUFFIX)
}

/// Returns true for string, number and boolean values
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Truthiness of an identity value: non-empty strings, non-zero numbers
/// and `true` count as a present identity.
pub fn is_present_identity(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Canon
// ============================================================================

/// Canonical entity name: an optional base namespace plus a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canon {
    base: Option<String>,
    name: String,
}

impl Canon {
    /// Creates a canon without a base namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: None,
            name: name.into(),
        }
    }

    /// Creates a canon inside a base namespace
    pub fn with_base(base: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base: Some(base.into()),
            name: name.into(),
        }
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name: `{base}_{name}` or `{name}`
    pub fn table_name(&self) -> String {
        match &self.base {
            Some(base) => format!("{}_{}", base, self.name),
            None => self.name.clone(),
        }
    }
}

impl Display for Canon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.base {
            Some(base) => write!(f, "{}/{}", base, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parses `name`, `base/name` or `zone/base/name`. The zone segment is
/// accepted and ignored; `-` stands for an empty segment.
impl FromStr for Canon {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segment = |part: &str| -> Option<String> {
            let part = part.trim();
            if part.is_empty() || part == "-" {
                None
            } else {
                Some(part.to_string())
            }
        };

        let parts: Vec<&str> = s.split('/').collect();
        let (base, name) = match parts.as_slice() {
            [name] => (None, segment(name)),
            [base, name] => (segment(base), segment(name)),
            [_zone, base, name] => (segment(base), segment(name)),
            _ => {
                return Err(StoreError::InvalidEntity(format!(
                    "too many segments in canon '{}'",
                    s
                )))
            }
        };

        let name = name
            .ok_or_else(|| StoreError::InvalidEntity(format!("canon '{}' has no name", s)))?;
        Ok(Self { base, name })
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A named, mutable record of field → value pairs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    canon: Canon,
    fields: Fields,
    #[serde(skip)]
    id_hint: Option<Value>,
}

impl Entity {
    /// Creates an empty entity of the given canon
    pub fn new(canon: Canon) -> Self {
        Self {
            canon,
            fields: Fields::new(),
            id_hint: None,
        }
    }

    /// Creates an entity from a raw field map, stripping directive keys.
    ///
    /// The `id$` directive is kept aside as the identity hint used by inserts.
    pub fn from_fields(canon: Canon, raw: Fields) -> Self {
        let mut entity = Self::new(canon);
        for (key, value) in raw {
            entity.set(key, value);
        }
        entity
    }

    /// Creates an entity from a JSON object
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidEntity` if `value` is not an object.
    pub fn from_json(canon: Canon, value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => Ok(Self::from_fields(canon, map)),
            Value::Null => Ok(Self::new(canon)),
            other => Err(StoreError::InvalidEntity(format!(
                "expected a JSON object for {}, got {}",
                canon, other
            ))),
        }
    }

    pub fn canon(&self) -> &Canon {
        &self.canon
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field. Directive keys are not stored as data; `id$` becomes
    /// the identity hint.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field == ID_HINT_DIRECTIVE {
            self.id_hint = Some(value);
        } else if !is_directive(&field) {
            self.fields.insert(field, value);
        }
    }

    /// Returns the identity if one is present (see [`is_present_identity`])
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(ID_FIELD).filter(|v| is_present_identity(v))
    }

    pub fn has_identity(&self) -> bool {
        self.id().is_some()
    }

    pub fn set_id(&mut self, id: Value) {
        self.fields.insert(ID_FIELD.to_string(), id);
    }

    /// Caller-supplied identity for the next insert, when present
    pub fn id_hint(&self) -> Option<&Value> {
        self.id_hint.as_ref().filter(|v| is_present_identity(v))
    }

    #[must_use]
    pub fn with_id_hint(mut self, id: Value) -> Self {
        self.id_hint = Some(id);
        self
    }

    /// Returns a copy of this entity's canon with the given fields
    pub fn make(&self, fields: Fields) -> Self {
        Self::from_fields(self.canon.clone(), fields)
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Plain JSON object of the data fields
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
