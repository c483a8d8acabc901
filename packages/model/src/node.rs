//! # Node
//!
//! The value-like record stored in a document. A node is an id, a schema
//! type, and a map of typed properties. Nodes reference each other by id
//! only; the store is the single owner.
//!
//! JSON form (snapshots, operation wire format): `{"id", "type", ...props}`.
//! Decoding is schema-aware so ambiguous JSON (a date string, an id array)
//! lands on the declared property type.

use crate::property::{PropertyPath, PropertyValue};
use crate::schema::Schema;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Missing field '{0}' in node JSON")]
    MissingField(&'static str),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown property '{property}' for node type '{node_type}'")]
    UnknownProperty {
        node_type: String,
        property: String,
    },

    #[error("Invalid value for '{property}': {message}")]
    BadValue { property: String, message: String },

    #[error("Invalid JSON shape: {0}")]
    BadShape(String),
}

/// Typed record living in the store.
///
/// Properties are held in a `BTreeMap` so iteration, serialization, and
/// store equality are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: String,
    node_type: String,
    properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property assignment.
    pub fn with(mut self, property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.properties.get(property)
    }

    /// Replace a property value, returning the previous one.
    pub fn set_value(
        &mut self,
        property: impl Into<String>,
        value: PropertyValue,
    ) -> Option<PropertyValue> {
        self.properties.insert(property.into(), value)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Paths of every property on this node, for change fan-out.
    pub fn property_paths(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        self.properties
            .keys()
            .map(|prop| PropertyPath::new(self.id.clone(), prop.clone()))
    }

    // Typed accessors. These return None on absent or mistyped properties;
    // the store validated types at creation.

    pub fn text(&self, property: &str) -> Option<&str> {
        self.get(property).and_then(PropertyValue::as_str)
    }

    pub fn int(&self, property: &str) -> Option<i64> {
        self.get(property).and_then(PropertyValue::as_int)
    }

    pub fn id_ref(&self, property: &str) -> Option<&str> {
        self.get(property).and_then(PropertyValue::as_id)
    }

    pub fn id_list(&self, property: &str) -> Option<&[String]> {
        self.get(property).and_then(PropertyValue::as_id_list)
    }

    pub fn path(&self, property: &str) -> Option<&PropertyPath> {
        self.get(property).and_then(PropertyValue::as_path)
    }

    /// JSON form `{"id", "type", ...props}`.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("type".to_string(), Value::String(self.node_type.clone()));
        for (prop, value) in &self.properties {
            map.insert(prop.clone(), value.to_json());
        }
        Value::Object(map)
    }

    /// Schema-aware decode of the JSON form. Unknown types and properties
    /// are rejected; declared properties absent from the JSON are left for
    /// the store to default at creation.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Node, DecodeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| DecodeError::BadShape(format!("expected object, found {}", value)))?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("id"))?;
        let node_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("type"))?;

        let declared = schema
            .effective_properties(node_type)
            .map_err(|_| DecodeError::UnknownNodeType(node_type.to_string()))?;

        let mut node = Node::new(id, node_type);
        for (key, raw) in obj {
            if key == "id" || key == "type" {
                continue;
            }
            let ty = declared
                .get(key)
                .ok_or_else(|| DecodeError::UnknownProperty {
                    node_type: node_type.to_string(),
                    property: key.clone(),
                })?;
            let value = ty.coerce(raw).map_err(|message| DecodeError::BadValue {
                property: key.clone(),
                message,
            })?;
            node.properties.insert(key.clone(), value);
        }
        Ok(node)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.properties.len() + 2))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", &self.node_type)?;
        for (prop, value) in &self.properties {
            map.serialize_entry(prop, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyType;
    use crate::schema::{NodeTypeDef, TYPE_ANNOTATION, TYPE_TEXT};

    fn schema() -> Schema {
        let mut builder = Schema::builder("test", "1.0");
        builder
            .add_node_type(NodeTypeDef::new("paragraph").extends(TYPE_TEXT))
            .unwrap()
            .add_node_type(
                NodeTypeDef::new("strong")
                    .extends(TYPE_ANNOTATION)
                    .property("weight", PropertyType::Int),
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_json_roundtrip() {
        let schema = schema();
        let node = Node::new("s1", "strong")
            .with("path", PropertyPath::new("p1", "content"))
            .with("start_offset", 6)
            .with("end_offset", 11)
            .with("weight", 700);

        let json = node.to_json();
        assert_eq!(json["id"], "s1");
        assert_eq!(json["type"], "strong");
        assert_eq!(json["path"], serde_json::json!(["p1", "content"]));
        assert_eq!(json["start_offset"], 6);

        let back = Node::from_json(&schema, &json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_property() {
        let schema = schema();
        let err = Node::from_json(&schema, &serde_json::json!({"id": "x", "type": "figure"}))
            .unwrap_err();
        assert_eq!(err, DecodeError::UnknownNodeType("figure".to_string()));

        let err = Node::from_json(
            &schema,
            &serde_json::json!({"id": "p1", "type": "paragraph", "caption": "hi"}),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownProperty { .. }));
    }

    #[test]
    fn test_serde_serialize_matches_to_json() {
        let node = Node::new("p1", "paragraph").with("content", "Hello");
        let via_serde = serde_json::to_value(&node).unwrap();
        assert_eq!(via_serde, node.to_json());
    }
}
