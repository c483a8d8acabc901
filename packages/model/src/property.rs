//! # Property System
//!
//! Typed properties for document nodes.
//!
//! Every node field is a [`PropertyValue`] whose shape is declared in the
//! schema as a [`PropertyType`]. A [`PropertyPath`] addresses one property of
//! one node (`"p1.content"` in `data-path` form, `["p1", "content"]` on the
//! wire).

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Address of a single node property: `(node id, property name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyPath {
    pub node_id: String,
    pub property: String,
}

impl PropertyPath {
    pub fn new(node_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_id, self.property)
    }
}

impl FromStr for PropertyPath {
    type Err = String;

    /// Parses the `data-path` attribute form, `"id.prop"`. Node ids never
    /// contain dots, so the first dot is the separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((id, prop)) if !id.is_empty() && !prop.is_empty() => {
                Ok(PropertyPath::new(id, prop))
            }
            _ => Err(format!("invalid property path: {:?}", s)),
        }
    }
}

// Wire form is `["id", "prop"]`.
impl Serialize for PropertyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.node_id, &self.property).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (node_id, property): (String, String) = Deserialize::deserialize(deserializer)?;
        if node_id.is_empty() || property.is_empty() {
            return Err(D::Error::custom("property path segments must be non-empty"));
        }
        Ok(PropertyPath { node_id, property })
    }
}

/// Declared shape of a node property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Plain string; text properties host annotations.
    Str,
    Int,
    Bool,
    Date,
    /// Reference to a single node id.
    Id,
    /// Ordered list of node ids (container children).
    IdList,
    /// A `(node id, property)` pair (annotation anchors).
    Path,
    /// Opaque JSON payload.
    Json,
}

impl PropertyType {
    /// Short name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Str => "string",
            PropertyType::Int => "integer",
            PropertyType::Bool => "boolean",
            PropertyType::Date => "date",
            PropertyType::Id => "id",
            PropertyType::IdList => "id list",
            PropertyType::Path => "path",
            PropertyType::Json => "json",
        }
    }

    /// Value a freshly created node gets when the caller omits the property.
    pub fn default_value(&self) -> PropertyValue {
        match self {
            PropertyType::Str => PropertyValue::Str(String::new()),
            PropertyType::Int => PropertyValue::Int(0),
            PropertyType::Bool => PropertyValue::Bool(false),
            PropertyType::IdList => PropertyValue::IdList(Vec::new()),
            PropertyType::Date
            | PropertyType::Id
            | PropertyType::Path
            | PropertyType::Json => PropertyValue::Null,
        }
    }

    /// Whether `value` is acceptable for this type. `Null` stands in for
    /// absent references, dates, paths and JSON payloads.
    pub fn matches(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (PropertyType::Str, PropertyValue::Str(_)) => true,
            (PropertyType::Int, PropertyValue::Int(_)) => true,
            (PropertyType::Bool, PropertyValue::Bool(_)) => true,
            (PropertyType::Date, PropertyValue::Date(_)) => true,
            (PropertyType::Id, PropertyValue::Id(_)) => true,
            (PropertyType::IdList, PropertyValue::IdList(_)) => true,
            (PropertyType::Path, PropertyValue::Path(_)) => true,
            (PropertyType::Json, PropertyValue::Json(_)) => true,
            (
                PropertyType::Date | PropertyType::Id | PropertyType::Path | PropertyType::Json,
                PropertyValue::Null,
            ) => true,
            _ => false,
        }
    }

    /// Decode a JSON value into a typed property value. The schema drives
    /// this, so `"2024-01-01T00:00:00Z"` becomes a date for a `Date`
    /// property and stays a string for a `Str` one.
    pub fn coerce(&self, value: &Value) -> Result<PropertyValue, String> {
        if value.is_null() {
            let v = PropertyValue::Null;
            if self.matches(&v) {
                return Ok(v);
            }
            return Err(format!("{:?} property cannot be null", self));
        }
        match self {
            PropertyType::Str => value
                .as_str()
                .map(|s| PropertyValue::Str(s.to_string()))
                .ok_or_else(|| format!("expected string, found {}", value)),
            PropertyType::Int => value
                .as_i64()
                .map(PropertyValue::Int)
                .ok_or_else(|| format!("expected integer, found {}", value)),
            PropertyType::Bool => value
                .as_bool()
                .map(PropertyValue::Bool)
                .ok_or_else(|| format!("expected boolean, found {}", value)),
            PropertyType::Date => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected RFC 3339 date string, found {}", value))?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| PropertyValue::Date(dt.with_timezone(&Utc)))
                    .map_err(|e| format!("invalid date {:?}: {}", s, e))
            }
            PropertyType::Id => value
                .as_str()
                .map(|s| PropertyValue::Id(s.to_string()))
                .ok_or_else(|| format!("expected node id string, found {}", value)),
            PropertyType::IdList => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| format!("expected id array, found {}", value))?;
                let mut ids = Vec::with_capacity(arr.len());
                for item in arr {
                    ids.push(
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| format!("expected id string, found {}", item))?,
                    );
                }
                Ok(PropertyValue::IdList(ids))
            }
            PropertyType::Path => {
                let path: PropertyPath = serde_json::from_value(value.clone())
                    .map_err(|e| format!("invalid path {}: {}", value, e))?;
                Ok(PropertyValue::Path(path))
            }
            PropertyType::Json => Ok(PropertyValue::Json(value.clone())),
        }
    }
}

/// A single typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Date(DateTime<Utc>),
    Id(String),
    IdList(Vec<String>),
    Path(PropertyPath),
    Json(Value),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            PropertyValue::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_id_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::IdList(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PropertyPath> {
        match self {
            PropertyValue::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Short name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Int(_) => "integer",
            PropertyValue::Str(_) => "string",
            PropertyValue::Date(_) => "date",
            PropertyValue::Id(_) => "id",
            PropertyValue::IdList(_) => "id list",
            PropertyValue::Path(_) => "path",
            PropertyValue::Json(_) => "json",
        }
    }

    /// JSON form used by snapshots and the operation wire format.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(n) => Value::from(*n),
            PropertyValue::Str(s) => Value::String(s.clone()),
            PropertyValue::Date(dt) => Value::String(dt.to_rfc3339()),
            PropertyValue::Id(id) => Value::String(id.clone()),
            PropertyValue::IdList(ids) => Value::from(ids.clone()),
            PropertyValue::Path(path) => {
                Value::from(vec![path.node_id.clone(), path.property.clone()])
            }
            PropertyValue::Json(v) => v.clone(),
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Int(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<PropertyPath> for PropertyValue {
    fn from(p: PropertyPath) -> Self {
        PropertyValue::Path(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display_roundtrip() {
        let path = PropertyPath::new("p1", "content");
        assert_eq!(path.to_string(), "p1.content");
        assert_eq!("p1.content".parse::<PropertyPath>().unwrap(), path);
    }

    #[test]
    fn test_path_parse_rejects_garbage() {
        assert!("p1".parse::<PropertyPath>().is_err());
        assert!(".content".parse::<PropertyPath>().is_err());
        assert!("p1.".parse::<PropertyPath>().is_err());
    }

    #[test]
    fn test_path_wire_form_is_pair() {
        let path = PropertyPath::new("p1", "content");
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, serde_json::json!(["p1", "content"]));

        let back: PropertyPath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn test_type_defaults_match_their_type() {
        for ty in [
            PropertyType::Str,
            PropertyType::Int,
            PropertyType::Bool,
            PropertyType::Date,
            PropertyType::Id,
            PropertyType::IdList,
            PropertyType::Path,
            PropertyType::Json,
        ] {
            assert!(ty.matches(&ty.default_value()));
        }
    }

    #[test]
    fn test_coerce_is_schema_driven() {
        let date = PropertyType::Date
            .coerce(&serde_json::json!("2024-01-01T00:00:00Z"))
            .unwrap();
        assert!(matches!(date, PropertyValue::Date(_)));

        // The same JSON stays a plain string for a Str property.
        let s = PropertyType::Str
            .coerce(&serde_json::json!("2024-01-01T00:00:00Z"))
            .unwrap();
        assert_eq!(s, PropertyValue::Str("2024-01-01T00:00:00Z".to_string()));

        assert!(PropertyType::Int.coerce(&serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_null_only_matches_optional_types() {
        assert!(PropertyType::Id.matches(&PropertyValue::Null));
        assert!(PropertyType::Path.matches(&PropertyValue::Null));
        assert!(!PropertyType::Str.matches(&PropertyValue::Null));
        assert!(!PropertyType::Int.matches(&PropertyValue::Null));
    }
}
