//! # Data Store
//!
//! In-memory object store: nodes keyed by id plus derived indices (by type,
//! by annotation path, by container annotation). The store is the single
//! owner of node data; everything else holds ids and re-resolves on access.
//!
//! ## Mutation model
//!
//! 1. **Capturing mutators** (`create`, `delete`, `set`, `update`,
//!    `splice_text`, `show`, `hide`) validate against the schema and current
//!    state, then apply and return a fully-captured invertible [`Op`].
//! 2. **Replay** (`apply`) takes a captured op and applies it structurally,
//!    for commit propagation, undo and redo. Replay does not re-check
//!    annotation ranges: mid-history states may transiently violate them
//!    (a `set` shrinking a text leaves annotations wide until the next op).
//!
//! Every applied op is dispatched to every index, so indices stay derivable
//! from the node table at all times. Applying a string splice to a text
//! property also transforms the offsets of annotations anchored on that
//! path; the transform is part of op application and happens identically on
//! the live and shadow stores, and symmetrically under inversion.

use crate::annotations::{
    Annotation, AnnotationIndex, ContainerAnnotation, ContainerAnnotationIndex,
};
use crate::container::Container;
use crate::node::Node;
use crate::ops::{char_len, Diff, NodeTypeLookup, Op, OpError, OpResult};
use crate::property::{PropertyPath, PropertyValue};
use crate::schema::Schema;
use crate::selection::{ContainerOrder, Selection};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Hook interface every secondary index implements; the store dispatches
/// each applied op to each index. `node` is the post-application record
/// except for `on_delete`, which sees the removed record.
pub trait StoreIndex {
    fn on_create(&mut self, node: &Node);
    fn on_delete(&mut self, node: &Node);
    fn on_set(
        &mut self,
        node: &Node,
        path: &PropertyPath,
        old: &PropertyValue,
        new: &PropertyValue,
    );
    fn on_update(&mut self, node: &Node, path: &PropertyPath, diff: &Diff);
    fn clear(&mut self);
}

/// Index of node ids by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    by_type: BTreeMap<String, BTreeSet<String>>,
}

impl TypeIndex {
    pub fn ids(&self, node_type: &str) -> Vec<&str> {
        self.by_type
            .get(node_type)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl StoreIndex for TypeIndex {
    fn on_create(&mut self, node: &Node) {
        self.by_type
            .entry(node.node_type().to_string())
            .or_default()
            .insert(node.id().to_string());
    }

    fn on_delete(&mut self, node: &Node) {
        if let Some(ids) = self.by_type.get_mut(node.node_type()) {
            ids.remove(node.id());
            if ids.is_empty() {
                self.by_type.remove(node.node_type());
            }
        }
    }

    fn on_set(&mut self, _: &Node, _: &PropertyPath, _: &PropertyValue, _: &PropertyValue) {}

    fn on_update(&mut self, _: &Node, _: &PropertyPath, _: &Diff) {}

    fn clear(&mut self) {
        self.by_type.clear();
    }
}

/// The node table plus its indices.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Arc<Schema>,
    nodes: BTreeMap<String, Node>,
    types: TypeIndex,
    annotations: AnnotationIndex,
    container_annotations: ContainerAnnotationIndex,
}

// Indices are derivable; two stores are equal iff their node tables are.
impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl NodeTypeLookup for Store {
    fn node_type_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(Node::node_type)
    }
}

impl Store {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            types: TypeIndex::default(),
            annotations: AnnotationIndex::new(schema.clone()),
            container_annotations: ContainerAnnotationIndex::new(schema.clone()),
            schema,
            nodes: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ids_of_type(&self, node_type: &str) -> Vec<&str> {
        self.types.ids(node_type)
    }

    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&Node> {
        self.types
            .ids(node_type)
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Text content at a path.
    pub fn text_at(&self, path: &PropertyPath) -> OpResult<&str> {
        let node = self
            .get(&path.node_id)
            .ok_or_else(|| OpError::NodeNotFound(path.node_id.clone()))?;
        match node.get(&path.property) {
            Some(value) => value.as_str().ok_or_else(|| OpError::NotText {
                path: path.clone(),
            }),
            None => Err(OpError::UnknownProperty {
                node_type: node.node_type().to_string(),
                property: path.property.clone(),
            }),
        }
    }

    /// Container view over a container node.
    pub fn container(&self, id: &str) -> OpResult<Container<'_>> {
        let node = self
            .get(id)
            .ok_or_else(|| OpError::NodeNotFound(id.to_string()))?;
        if !self.schema.is_container_type(node.node_type()) {
            return Err(OpError::NotAContainer(id.to_string()));
        }
        Ok(Container::new(node))
    }

    pub fn annotation_index(&self) -> &AnnotationIndex {
        &self.annotations
    }

    pub fn container_annotation_index(&self) -> &ContainerAnnotationIndex {
        &self.container_annotations
    }

    /// Annotations on `path` intersecting `[start, end]` (closed), oldest
    /// anchor first, optionally narrowed to a node type and its subtypes.
    pub fn annotations_in(
        &self,
        path: &PropertyPath,
        start: usize,
        end: usize,
        node_type: Option<&str>,
    ) -> Vec<Annotation<'_>> {
        self.annotations
            .get_typed(path, start, end, node_type)
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .map(Annotation::new)
            .collect()
    }

    /// Container annotations whose current extent overlaps `sel`. A
    /// selection without a container yields an empty result.
    pub fn annotations_for_selection(
        &self,
        sel: &Selection,
        node_type: Option<&str>,
    ) -> Vec<ContainerAnnotation<'_>> {
        let Selection::Container(container_sel) = sel else {
            return Vec::new();
        };
        let Ok(container) = self.container(&container_sel.container) else {
            return Vec::new();
        };
        let order = ContainerOrder::from_container(&container);

        self.container_annotations
            .for_container(&container_sel.container)
            .into_iter()
            .filter_map(|id| self.nodes.get(id))
            .map(ContainerAnnotation::new)
            .filter(|anno| {
                node_type
                    .map(|ty| self.schema.is_instance_of(anno.node_type(), ty))
                    .unwrap_or(true)
            })
            .filter(|anno| {
                anno.selection()
                    .map(|anno_sel| anno_sel.overlaps(sel, &order))
                    .unwrap_or(false)
            })
            .collect()
    }

    // ---- capturing mutators ----------------------------------------------

    /// Validate and create a node, returning the captured op. Missing
    /// declared properties are filled with schema defaults.
    pub fn create(&mut self, node: Node) -> OpResult<Op> {
        let normalized = self.validate_create(node)?;
        let op = Op::Create { node: normalized };
        self.apply(&op)?;
        Ok(op)
    }

    /// Delete a node, capturing its record for inversion. Callers remove
    /// inbound references first; the store does not cascade.
    pub fn delete(&mut self, id: &str) -> OpResult<Op> {
        let node = self
            .get(id)
            .ok_or_else(|| OpError::NodeNotFound(id.to_string()))?
            .clone();
        let op = Op::Delete { node };
        self.apply(&op)?;
        Ok(op)
    }

    /// Whole-property replace, capturing the original value.
    pub fn set(&mut self, path: &PropertyPath, value: PropertyValue) -> OpResult<Op> {
        let node = self
            .get(&path.node_id)
            .ok_or_else(|| OpError::NodeNotFound(path.node_id.clone()))?;
        let declared = self
            .schema
            .effective_properties(node.node_type())
            .map_err(|_| OpError::UnknownNodeType(node.node_type().to_string()))?;
        let ty = declared
            .get(&path.property)
            .ok_or_else(|| OpError::UnknownProperty {
                node_type: node.node_type().to_string(),
                property: path.property.clone(),
            })?;
        if !ty.matches(&value) {
            return Err(OpError::TypeMismatch {
                path: path.clone(),
                expected: ty.name(),
                found: value.type_name(),
            });
        }
        self.validate_refs(&path.node_id, &value)?;

        let original = node
            .get(&path.property)
            .cloned()
            .unwrap_or_else(|| ty.default_value());
        let op = Op::Set {
            path: path.clone(),
            value,
            original,
        };
        self.apply(&op)?;
        Ok(op)
    }

    /// Typed diff update. The diff must carry the captured side (`delete`
    /// text / `remove` ids); use [`splice_text`](Self::splice_text) to have
    /// the store capture removed text for you.
    pub fn update(&mut self, path: &PropertyPath, diff: Diff) -> OpResult<Op> {
        let node = self
            .get(&path.node_id)
            .ok_or_else(|| OpError::NodeNotFound(path.node_id.clone()))?;
        let current = node
            .get(&path.property)
            .ok_or_else(|| OpError::UnknownProperty {
                node_type: node.node_type().to_string(),
                property: path.property.clone(),
            })?;
        // Dry-run validates kinds, bounds and the captured side.
        diff.apply_to(current, path)?;
        if let Diff::ListSplice { insert, .. } = &diff {
            for id in insert {
                if !self.contains(id) {
                    return Err(OpError::DanglingReference {
                        from: path.node_id.clone(),
                        to: id.clone(),
                    });
                }
            }
        }
        let op = Op::Update {
            path: path.clone(),
            diff,
        };
        self.apply(&op)?;
        Ok(op)
    }

    /// Replace `remove_len` characters at `offset` with `insert`, capturing
    /// the removed text.
    pub fn splice_text(
        &mut self,
        path: &PropertyPath,
        offset: usize,
        remove_len: usize,
        insert: &str,
    ) -> OpResult<Op> {
        let text = self.text_at(path)?;
        let total = char_len(text);
        if offset + remove_len > total {
            return Err(OpError::SpliceOutOfRange {
                path: path.clone(),
                offset,
                len: remove_len,
                actual: total,
            });
        }
        let delete: String = text.chars().skip(offset).take(remove_len).collect();
        self.update(
            path,
            Diff::StringSplice {
                offset,
                delete,
                insert: insert.to_string(),
            },
        )
    }

    /// Show `node_id` in a container, appending unless `pos` is given.
    pub fn show(&mut self, container_id: &str, node_id: &str, pos: Option<usize>) -> OpResult<Op> {
        if !self.contains(node_id) {
            return Err(OpError::DanglingReference {
                from: container_id.to_string(),
                to: node_id.to_string(),
            });
        }
        let diff = self.container(container_id)?.show_diff(node_id, pos);
        self.update(&PropertyPath::new(container_id, "nodes"), diff)
    }

    /// Hide the first occurrence of `node_id` in a container. A node the
    /// container does not show is a no-op, not an error.
    pub fn hide(&mut self, container_id: &str, node_id: &str) -> OpResult<Option<Op>> {
        let Some(diff) = self.container(container_id)?.hide_diff(node_id) else {
            return Ok(None);
        };
        self.update(&PropertyPath::new(container_id, "nodes"), diff)
            .map(Some)
    }

    // ---- replay ----------------------------------------------------------

    /// Apply a captured op: commit propagation, undo, redo, stage sync.
    /// Fails without partial application.
    pub fn apply(&mut self, op: &Op) -> OpResult<()> {
        match op {
            Op::Create { node } => {
                if self.nodes.contains_key(node.id()) {
                    return Err(OpError::DuplicateNode(node.id().to_string()));
                }
                self.nodes.insert(node.id().to_string(), node.clone());
                let node = &self.nodes[node.id()];
                self.types.on_create(node);
                self.annotations.on_create(node);
                self.container_annotations.on_create(node);
            }
            Op::Delete { node } => {
                let removed = self
                    .nodes
                    .remove(node.id())
                    .ok_or_else(|| OpError::NodeNotFound(node.id().to_string()))?;
                self.types.on_delete(&removed);
                self.annotations.on_delete(&removed);
                self.container_annotations.on_delete(&removed);
            }
            Op::Set { path, value, .. } => {
                let node = self
                    .nodes
                    .get_mut(&path.node_id)
                    .ok_or_else(|| OpError::NodeNotFound(path.node_id.clone()))?;
                let old = node
                    .set_value(path.property.clone(), value.clone())
                    .unwrap_or(PropertyValue::Null);
                let node = &self.nodes[&path.node_id];
                self.types.on_set(node, path, &old, value);
                self.annotations.on_set(node, path, &old, value);
                self.container_annotations.on_set(node, path, &old, value);
            }
            Op::Update { path, diff } => {
                let node = self
                    .nodes
                    .get_mut(&path.node_id)
                    .ok_or_else(|| OpError::NodeNotFound(path.node_id.clone()))?;
                let current = node
                    .get(&path.property)
                    .ok_or_else(|| OpError::UnknownProperty {
                        node_type: node.node_type().to_string(),
                        property: path.property.clone(),
                    })?;
                let next = diff.apply_to(current, path)?;
                node.set_value(path.property.clone(), next);
                let node = &self.nodes[&path.node_id];
                self.types.on_update(node, path, diff);
                self.annotations.on_update(node, path, diff);
                self.container_annotations.on_update(node, path, diff);

                if let Diff::StringSplice {
                    offset,
                    delete,
                    insert,
                } = diff
                {
                    self.transform_annotations(path, *offset, char_len(delete), char_len(insert));
                }
            }
        }
        debug!(node = %op.node_id(), "applied op");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.types.clear();
        self.annotations.clear();
        self.container_annotations.clear();
    }

    // ---- internals -------------------------------------------------------

    fn validate_create(&self, node: Node) -> OpResult<Node> {
        if !self.schema.contains_type(node.node_type()) {
            return Err(OpError::UnknownNodeType(node.node_type().to_string()));
        }
        if self.contains(node.id()) {
            return Err(OpError::DuplicateNode(node.id().to_string()));
        }
        let declared = self
            .schema
            .effective_properties(node.node_type())
            .map_err(|_| OpError::UnknownNodeType(node.node_type().to_string()))?;

        for (prop, value) in node.properties() {
            let ty = declared.get(prop).ok_or_else(|| OpError::UnknownProperty {
                node_type: node.node_type().to_string(),
                property: prop.to_string(),
            })?;
            if !ty.matches(value) {
                return Err(OpError::TypeMismatch {
                    path: PropertyPath::new(node.id(), prop),
                    expected: ty.name(),
                    found: value.type_name(),
                });
            }
            self.validate_refs(node.id(), value)?;
        }

        let mut normalized = node;
        for (prop, ty) in &declared {
            if normalized.get(prop).is_none() {
                normalized.set_value(prop.clone(), ty.default_value());
            }
        }

        if self.schema.is_annotation_type(normalized.node_type()) {
            let anno = Annotation::new(&normalized);
            let path = anno.path().ok_or_else(|| OpError::DanglingReference {
                from: normalized.id().to_string(),
                to: String::from("<missing path>"),
            })?;
            self.validate_anchor(normalized.id(), path, anno.start_offset(), anno.end_offset())?;
        }
        if self.schema.is_container_annotation_type(normalized.node_type()) {
            let anno = ContainerAnnotation::new(&normalized);
            if let Some(container) = anno.container() {
                let target =
                    self.get(container)
                        .ok_or_else(|| OpError::DanglingReference {
                            from: normalized.id().to_string(),
                            to: container.to_string(),
                        })?;
                if !self.schema.is_container_type(target.node_type()) {
                    return Err(OpError::NotAContainer(container.to_string()));
                }
            }
            if let (Some(start_path), Some(end_path)) = (anno.start_path(), anno.end_path()) {
                let start = anno.start_offset();
                let end = anno.end_offset();
                self.validate_anchor(normalized.id(), start_path, start, start)?;
                self.validate_anchor(normalized.id(), end_path, end, end)?;
            }
        }

        Ok(normalized)
    }

    fn validate_anchor(
        &self,
        from: &str,
        path: &PropertyPath,
        start: usize,
        end: usize,
    ) -> OpResult<()> {
        let target = self
            .get(&path.node_id)
            .ok_or_else(|| OpError::DanglingReference {
                from: from.to_string(),
                to: path.node_id.clone(),
            })?;
        let text = target
            .text(&path.property)
            .ok_or_else(|| OpError::NotText { path: path.clone() })?;
        let len = char_len(text);
        if start > end || end > len {
            return Err(OpError::AnnotationRange {
                path: path.clone(),
                start,
                end,
                len,
            });
        }
        Ok(())
    }

    fn validate_refs(&self, from: &str, value: &PropertyValue) -> OpResult<()> {
        let check = |id: &str| -> OpResult<()> {
            if self.contains(id) {
                Ok(())
            } else {
                Err(OpError::DanglingReference {
                    from: from.to_string(),
                    to: id.to_string(),
                })
            }
        };
        match value {
            PropertyValue::Id(id) => check(id),
            PropertyValue::IdList(ids) => ids.iter().try_for_each(|id| check(id)),
            PropertyValue::Path(path) => check(&path.node_id),
            _ => Ok(()),
        }
    }

    /// Shift annotation offsets after a text splice on `path`. Runs on
    /// every store applying the op, so live and shadow stay in lockstep.
    fn transform_annotations(
        &mut self,
        path: &PropertyPath,
        offset: usize,
        removed: usize,
        inserted: usize,
    ) {
        if removed == 0 && inserted == 0 {
            return;
        }

        for id in self.annotations.ids_on_path(path) {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let start = node.int("start_offset").unwrap_or(0).max(0) as usize;
            let end = node.int("end_offset").unwrap_or(0).max(0) as usize;
            let (new_start, new_end) = transform_range(start, end, offset, removed, inserted);
            if (new_start, new_end) != (start, end) {
                node.set_value("start_offset", PropertyValue::Int(new_start as i64));
                node.set_value("end_offset", PropertyValue::Int(new_end as i64));
                self.annotations.reanchor(path, &id, new_start, new_end);
            }
        }

        let container_annos: Vec<String> =
            self.container_annotations.ids().map(str::to_string).collect();
        for id in container_annos {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.path("start_path") == Some(path) {
                let start = node.int("start_offset").unwrap_or(0).max(0) as usize;
                let moved = transform_coord(start, offset, removed, inserted, false);
                node.set_value("start_offset", PropertyValue::Int(moved as i64));
            }
            if node.path("end_path") == Some(path) {
                let end = node.int("end_offset").unwrap_or(0).max(0) as usize;
                let moved = transform_coord(end, offset, removed, inserted, true);
                node.set_value("end_offset", PropertyValue::Int(moved as i64));
            }
        }
    }
}

/// Map one character offset across a splice at `p` removing `removed` and
/// inserting `inserted` characters. End anchors do not expand on insertion
/// exactly at the anchor.
fn transform_coord(o: usize, p: usize, removed: usize, inserted: usize, is_end: bool) -> usize {
    let q = p + removed;
    let mut o = if o <= p {
        o
    } else if o >= q {
        o - removed
    } else {
        p
    };
    if inserted > 0 {
        let shifts = if is_end { p < o } else { p <= o };
        if shifts {
            o += inserted;
        }
    }
    o
}

fn transform_range(
    start: usize,
    end: usize,
    p: usize,
    removed: usize,
    inserted: usize,
) -> (usize, usize) {
    let start = transform_coord(start, p, removed, inserted, false);
    let end = transform_coord(end, p, removed, inserted, true).max(start);
    (start, end)
}
