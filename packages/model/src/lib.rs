//! # Substance Model
//!
//! Typed document model for structured-document editors.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ schema: node types, properties, roles       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ store: id → node table + derived indices    │
//! │  - capturing mutators → invertible ops      │
//! │  - replay of captured ops (undo/redo)       │
//! │  - annotation offset transforms on splices  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ indices: by type, by annotation path,       │
//! │          by container annotation            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The store owns the nodes**: references are string ids, never
//!    handles; a stale id is a lookup miss, never a dangling pointer.
//! 2. **Ops capture their inverse at apply time**: history never consults
//!    the store to undo.
//! 3. **Indices are derivable**: every applied op is dispatched to every
//!    index, so they can always be rebuilt from the node table.

mod annotations;
mod container;
mod id;
mod node;
mod ops;
mod property;
mod schema;
mod selection;
mod store;

pub use annotations::{Annotation, AnnotationIndex, ContainerAnnotation, ContainerAnnotationIndex};
pub use container::Container;
pub use id::{document_seed, NodeIdGenerator};
pub use node::{DecodeError, Node};
pub use ops::{Diff, NodeTypeLookup, Op, OpError, OpResult};
pub use property::{PropertyPath, PropertyType, PropertyValue};
pub use schema::{
    NodeTypeDef, Schema, SchemaBuilder, SchemaError, SchemaResult, TYPE_ANNOTATION,
    TYPE_CONTAINER, TYPE_CONTAINER_ANNOTATION, TYPE_NODE, TYPE_TEXT,
};
pub use selection::{
    CollapseTo, ContainerOrder, ContainerSelection, Coordinate, PropertySelection, Selection,
};
pub use store::{Store, StoreIndex, TypeIndex};
