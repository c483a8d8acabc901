//! # Schema
//!
//! Declarative registry of node types.
//!
//! A schema is built once, frozen, and shared (`Arc`) between the live and
//! shadow stores. Node types form a nominal hierarchy: a type may declare a
//! parent, and its effective property map is the parent chain merged with
//! child declarations winning. Five base types are pre-registered in every
//! schema and anchor the built-in roles:
//!
//! - `node` — root of the hierarchy
//! - `text` — carries a `content` string that hosts annotations
//! - `container` — carries an ordered `nodes` id list
//! - `annotation` — `path` + `start_offset`/`end_offset`
//! - `container-annotation` — `start_path`/`end_path` anchors plus `container`

use crate::property::PropertyType;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const TYPE_NODE: &str = "node";
pub const TYPE_TEXT: &str = "text";
pub const TYPE_CONTAINER: &str = "container";
pub const TYPE_ANNOTATION: &str = "annotation";
pub const TYPE_CONTAINER_ANNOTATION: &str = "container-annotation";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Schema conflict: node type '{0}' is already registered")]
    Conflict(String),

    #[error("Node type '{name}' declares unknown parent '{parent}'")]
    UnknownParent { name: String, parent: String },
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Declaration of one node type: name, optional parent, own properties.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTypeDef {
    name: String,
    parent: Option<String>,
    properties: BTreeMap<String, PropertyType>,
}

impl NodeTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            properties: BTreeMap::new(),
        }
    }

    /// Declare the parent type. Properties are inherited through the chain.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Properties declared directly on this type (no inheritance).
    pub fn own_properties(&self) -> &BTreeMap<String, PropertyType> {
        &self.properties
    }
}

/// Immutable, frozen node type registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    version: String,
    types: HashMap<String, NodeTypeDef>,
    default_text_type: Option<String>,
}

impl Schema {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name, version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a registered node type.
    pub fn node_type(&self, name: &str) -> SchemaResult<&NodeTypeDef> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownNodeType(name.to_string()))
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The node type used when the editor needs "a plain text node",
    /// e.g. when splitting a paragraph.
    pub fn default_text_type(&self) -> Option<&str> {
        self.default_text_type.as_deref()
    }

    /// Whether `name` is `ancestor` or inherits from it.
    pub fn is_instance_of(&self, name: &str, ancestor: &str) -> bool {
        let mut current = Some(name);
        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }
            current = self.types.get(ty).and_then(|def| def.parent());
        }
        false
    }

    pub fn is_annotation_type(&self, name: &str) -> bool {
        self.is_instance_of(name, TYPE_ANNOTATION)
    }

    pub fn is_container_annotation_type(&self, name: &str) -> bool {
        self.is_instance_of(name, TYPE_CONTAINER_ANNOTATION)
    }

    pub fn is_container_type(&self, name: &str) -> bool {
        self.is_instance_of(name, TYPE_CONTAINER)
    }

    pub fn is_text_type(&self, name: &str) -> bool {
        self.is_instance_of(name, TYPE_TEXT)
    }

    /// Effective property map of a type: parent chain merged, child wins.
    pub fn effective_properties(&self, name: &str) -> SchemaResult<BTreeMap<String, PropertyType>> {
        // Collect the chain root-first so children override.
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(ty) = current {
            let def = self.node_type(ty)?;
            chain.push(def);
            current = def.parent();
        }

        let mut merged = BTreeMap::new();
        for def in chain.into_iter().rev() {
            for (prop, ty) in def.own_properties() {
                merged.insert(prop.clone(), *ty);
            }
        }
        Ok(merged)
    }
}

/// Mutable schema under construction. `build()` freezes it.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    version: String,
    types: HashMap<String, NodeTypeDef>,
    default_text_type: Option<String>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut builder = Self {
            name: name.into(),
            version: version.into(),
            types: HashMap::new(),
            default_text_type: None,
        };

        // Base types every document schema shares.
        builder.insert(NodeTypeDef::new(TYPE_NODE));
        builder.insert(
            NodeTypeDef::new(TYPE_TEXT)
                .extends(TYPE_NODE)
                .property("content", PropertyType::Str),
        );
        builder.insert(
            NodeTypeDef::new(TYPE_CONTAINER)
                .extends(TYPE_NODE)
                .property("nodes", PropertyType::IdList),
        );
        builder.insert(
            NodeTypeDef::new(TYPE_ANNOTATION)
                .extends(TYPE_NODE)
                .property("path", PropertyType::Path)
                .property("start_offset", PropertyType::Int)
                .property("end_offset", PropertyType::Int),
        );
        builder.insert(
            NodeTypeDef::new(TYPE_CONTAINER_ANNOTATION)
                .extends(TYPE_NODE)
                .property("start_path", PropertyType::Path)
                .property("start_offset", PropertyType::Int)
                .property("end_path", PropertyType::Path)
                .property("end_offset", PropertyType::Int)
                .property("container", PropertyType::Id),
        );

        builder
    }

    fn insert(&mut self, def: NodeTypeDef) {
        self.types.insert(def.name().to_string(), def);
    }

    /// Register a node type. Duplicate names conflict, including the
    /// built-in base types.
    pub fn add_node_type(&mut self, def: NodeTypeDef) -> SchemaResult<&mut Self> {
        if self.types.contains_key(def.name()) {
            return Err(SchemaError::Conflict(def.name().to_string()));
        }
        self.insert(def);
        Ok(self)
    }

    pub fn default_text_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_text_type = Some(name.into());
        self
    }

    /// Freeze. Validates that every declared parent and the default text
    /// type resolve.
    pub fn build(self) -> SchemaResult<Schema> {
        for def in self.types.values() {
            if let Some(parent) = def.parent() {
                if !self.types.contains_key(parent) {
                    return Err(SchemaError::UnknownParent {
                        name: def.name().to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }
        if let Some(text_type) = &self.default_text_type {
            if !self.types.contains_key(text_type) {
                return Err(SchemaError::UnknownNodeType(text_type.clone()));
            }
        }
        Ok(Schema {
            name: self.name,
            version: self.version,
            types: self.types,
            default_text_type: self.default_text_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_schema() -> Schema {
        let mut builder = Schema::builder("article", "1.0");
        builder
            .add_node_type(NodeTypeDef::new("paragraph").extends(TYPE_TEXT))
            .unwrap()
            .add_node_type(NodeTypeDef::new("strong").extends(TYPE_ANNOTATION))
            .unwrap()
            .add_node_type(
                NodeTypeDef::new("comment")
                    .extends(TYPE_CONTAINER_ANNOTATION)
                    .property("author", PropertyType::Str),
            )
            .unwrap()
            .default_text_type("paragraph");
        builder.build().unwrap()
    }

    #[test]
    fn test_builtin_roles_resolve_through_parents() {
        let schema = article_schema();
        assert!(schema.is_text_type("paragraph"));
        assert!(schema.is_annotation_type("strong"));
        assert!(schema.is_container_annotation_type("comment"));
        assert!(!schema.is_annotation_type("paragraph"));
        // container-annotations are not property annotations, and vice versa
        assert!(!schema.is_annotation_type("comment"));
        assert!(!schema.is_container_annotation_type("strong"));
        assert_eq!(schema.default_text_type(), Some("paragraph"));
    }

    #[test]
    fn test_effective_properties_inherit() {
        let schema = article_schema();
        let props = schema.effective_properties("comment").unwrap();
        assert_eq!(props.get("author"), Some(&PropertyType::Str));
        assert_eq!(props.get("container"), Some(&PropertyType::Id));
        assert_eq!(props.get("start_offset"), Some(&PropertyType::Int));
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let mut builder = Schema::builder("article", "1.0");
        builder
            .add_node_type(NodeTypeDef::new("paragraph").extends(TYPE_TEXT))
            .unwrap();
        let err = builder
            .add_node_type(NodeTypeDef::new("paragraph"))
            .unwrap_err();
        assert_eq!(err, SchemaError::Conflict("paragraph".to_string()));

        // Shadowing a built-in conflicts too.
        let err = builder.add_node_type(NodeTypeDef::new(TYPE_TEXT)).unwrap_err();
        assert_eq!(err, SchemaError::Conflict(TYPE_TEXT.to_string()));
    }

    #[test]
    fn test_unknown_type_lookup_fails() {
        let schema = article_schema();
        assert_eq!(
            schema.node_type("figure").unwrap_err(),
            SchemaError::UnknownNodeType("figure".to_string())
        );
    }

    #[test]
    fn test_unknown_parent_rejected_at_freeze() {
        let mut builder = Schema::builder("bad", "1.0");
        builder
            .add_node_type(NodeTypeDef::new("orphan").extends("missing"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(SchemaError::UnknownParent { .. })
        ));
    }
}
