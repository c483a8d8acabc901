//! # Annotation Indices
//!
//! Derived lookup structures over the node table.
//!
//! - [`AnnotationIndex`]: property-scoped annotations, one list per text
//!   path sorted by start offset. Range queries are closed on both ends, so
//!   a zero-length query at `k` matches annotations containing `k`.
//! - [`ContainerAnnotationIndex`]: container annotations by id plus reverse
//!   lookup by container. Overlap queries delegate to selection math because
//!   the spatial extent depends on the container's current order; no spatial
//!   acceleration structure is kept.
//!
//! Both are kept in sync by the store dispatching every applied op through
//! the [`StoreIndex`](crate::store::StoreIndex) hooks; both are fully
//! derivable from the node table.

use crate::node::Node;
use crate::ops::Diff;
use crate::property::{PropertyPath, PropertyValue};
use crate::schema::Schema;
use crate::selection::{ContainerSelection, PropertySelection, Selection};
use crate::store::StoreIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// View handle over a property-scoped annotation node.
#[derive(Debug, Clone, Copy)]
pub struct Annotation<'a> {
    node: &'a Node,
}

impl<'a> Annotation<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn node_type(&self) -> &str {
        self.node.node_type()
    }

    pub fn path(&self) -> Option<&'a PropertyPath> {
        self.node.path("path")
    }

    pub fn start_offset(&self) -> usize {
        self.node.int("start_offset").unwrap_or(0).max(0) as usize
    }

    pub fn end_offset(&self) -> usize {
        self.node.int("end_offset").unwrap_or(0).max(0) as usize
    }

    pub fn selection(&self) -> Option<Selection> {
        let path = self.path()?.clone();
        Some(Selection::Property(PropertySelection::new(
            path,
            self.start_offset(),
            self.end_offset(),
        )))
    }
}

/// View handle over a container annotation node.
#[derive(Debug, Clone, Copy)]
pub struct ContainerAnnotation<'a> {
    node: &'a Node,
}

impl<'a> ContainerAnnotation<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn node_type(&self) -> &str {
        self.node.node_type()
    }

    pub fn container(&self) -> Option<&'a str> {
        self.node.id_ref("container")
    }

    pub fn start_path(&self) -> Option<&'a PropertyPath> {
        self.node.path("start_path")
    }

    pub fn end_path(&self) -> Option<&'a PropertyPath> {
        self.node.path("end_path")
    }

    pub fn start_offset(&self) -> usize {
        self.node.int("start_offset").unwrap_or(0).max(0) as usize
    }

    pub fn end_offset(&self) -> usize {
        self.node.int("end_offset").unwrap_or(0).max(0) as usize
    }

    /// The container selection covering this annotation's current extent.
    pub fn selection(&self) -> Option<Selection> {
        Some(Selection::Container(ContainerSelection::new(
            self.container()?,
            self.start_path()?.clone(),
            self.start_offset(),
            self.end_path()?.clone(),
            self.end_offset(),
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    start: usize,
    end: usize,
    id: String,
    node_type: String,
}

impl Entry {
    fn sort_key(&self) -> (usize, usize, &str) {
        (self.start, self.end, &self.id)
    }
}

/// Property-scoped annotation index: per text path, annotations sorted by
/// start offset.
#[derive(Debug, Clone)]
pub struct AnnotationIndex {
    schema: Arc<Schema>,
    by_path: BTreeMap<PropertyPath, Vec<Entry>>,
}

impl AnnotationIndex {
    pub(crate) fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            by_path: BTreeMap::new(),
        }
    }

    /// Ids of annotations on `path` whose closed range intersects
    /// `[start, end]`, in start-offset order.
    pub fn get(&self, path: &PropertyPath, start: usize, end: usize) -> Vec<&str> {
        self.get_typed(path, start, end, None)
    }

    /// Like [`get`](Self::get) with an optional node type filter; the
    /// filter matches subtypes of the given type.
    pub fn get_typed(
        &self,
        path: &PropertyPath,
        start: usize,
        end: usize,
        node_type: Option<&str>,
    ) -> Vec<&str> {
        let Some(bucket) = self.by_path.get(path) else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for entry in bucket {
            if entry.start > end {
                break;
            }
            if entry.end < start {
                continue;
            }
            if let Some(filter) = node_type {
                if !self.schema.is_instance_of(&entry.node_type, filter) {
                    continue;
                }
            }
            hits.push(entry.id.as_str());
        }
        hits
    }

    /// Every annotation anchored on `path`, in start-offset order.
    pub fn ids_on_path(&self, path: &PropertyPath) -> Vec<String> {
        self.by_path
            .get(path)
            .map(|bucket| bucket.iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Move an annotation's cached offsets (after a text transform).
    pub(crate) fn reanchor(&mut self, path: &PropertyPath, id: &str, start: usize, end: usize) {
        let Some(bucket) = self.by_path.get_mut(path) else {
            return;
        };
        let Some(pos) = bucket.iter().position(|entry| entry.id == id) else {
            return;
        };
        let mut entry = bucket.remove(pos);
        entry.start = start;
        entry.end = end;
        let pos = bucket
            .binary_search_by(|probe| probe.sort_key().cmp(&entry.sort_key()))
            .unwrap_or_else(|pos| pos);
        bucket.insert(pos, entry);
    }

    fn insert_entry(&mut self, path: PropertyPath, entry: Entry) {
        let bucket = self.by_path.entry(path).or_default();
        let pos = bucket
            .binary_search_by(|probe| probe.sort_key().cmp(&entry.sort_key()))
            .unwrap_or_else(|pos| pos);
        bucket.insert(pos, entry);
    }

    fn remove_id(&mut self, path: &PropertyPath, id: &str) {
        if let Some(bucket) = self.by_path.get_mut(path) {
            bucket.retain(|entry| entry.id != id);
            if bucket.is_empty() {
                self.by_path.remove(path);
            }
        }
    }

    fn insert_node(&mut self, node: &Node) {
        let anno = Annotation::new(node);
        if let Some(path) = anno.path() {
            self.insert_entry(
                path.clone(),
                Entry {
                    start: anno.start_offset(),
                    end: anno.end_offset(),
                    id: node.id().to_string(),
                    node_type: node.node_type().to_string(),
                },
            );
        }
    }

    fn is_relevant(&self, node: &Node) -> bool {
        self.schema.is_annotation_type(node.node_type())
    }
}

impl StoreIndex for AnnotationIndex {
    fn on_create(&mut self, node: &Node) {
        if self.is_relevant(node) {
            self.insert_node(node);
        }
    }

    fn on_delete(&mut self, node: &Node) {
        if self.is_relevant(node) {
            if let Some(path) = Annotation::new(node).path() {
                let path = path.clone();
                self.remove_id(&path, node.id());
            }
        }
    }

    fn on_set(&mut self, node: &Node, path: &PropertyPath, old: &PropertyValue, _new: &PropertyValue) {
        if !self.is_relevant(node) {
            return;
        }
        match path.property.as_str() {
            "path" => {
                if let Some(old_anchor) = old.as_path() {
                    let old_anchor = old_anchor.clone();
                    self.remove_id(&old_anchor, node.id());
                }
                self.insert_node(node);
            }
            "start_offset" | "end_offset" => {
                if let Some(anchor) = Annotation::new(node).path() {
                    let anchor = anchor.clone();
                    self.remove_id(&anchor, node.id());
                    self.insert_node(node);
                }
            }
            _ => {}
        }
    }

    fn on_update(&mut self, node: &Node, path: &PropertyPath, diff: &Diff) {
        if !self.is_relevant(node) {
            return;
        }
        if matches!(diff, Diff::NumberDelta { .. })
            && matches!(path.property.as_str(), "start_offset" | "end_offset")
        {
            if let Some(anchor) = Annotation::new(node).path() {
                let anchor = anchor.clone();
                self.remove_id(&anchor, node.id());
                self.insert_node(node);
            }
        }
    }

    fn clear(&mut self) {
        self.by_path.clear();
    }
}

/// Container-annotation index: all ids plus reverse lookup by container.
#[derive(Debug, Clone)]
pub struct ContainerAnnotationIndex {
    schema: Arc<Schema>,
    by_id: BTreeSet<String>,
    by_container: BTreeMap<String, BTreeSet<String>>,
}

impl ContainerAnnotationIndex {
    pub(crate) fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            by_id: BTreeSet::new(),
            by_container: BTreeMap::new(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains(id)
    }

    /// Ids of container annotations anchored in `container`.
    pub fn for_container(&self, container: &str) -> Vec<&str> {
        self.by_container
            .get(container)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn is_relevant(&self, node: &Node) -> bool {
        self.schema.is_container_annotation_type(node.node_type())
    }

    fn link(&mut self, node: &Node) {
        self.by_id.insert(node.id().to_string());
        if let Some(container) = ContainerAnnotation::new(node).container() {
            self.by_container
                .entry(container.to_string())
                .or_default()
                .insert(node.id().to_string());
        }
    }

    fn unlink_container(&mut self, container: &str, id: &str) {
        if let Some(ids) = self.by_container.get_mut(container) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_container.remove(container);
            }
        }
    }
}

impl StoreIndex for ContainerAnnotationIndex {
    fn on_create(&mut self, node: &Node) {
        if self.is_relevant(node) {
            self.link(node);
        }
    }

    fn on_delete(&mut self, node: &Node) {
        if self.is_relevant(node) {
            self.by_id.remove(node.id());
            if let Some(container) = ContainerAnnotation::new(node).container() {
                let container = container.to_string();
                self.unlink_container(&container, node.id());
            }
        }
    }

    fn on_set(&mut self, node: &Node, path: &PropertyPath, old: &PropertyValue, _new: &PropertyValue) {
        if !self.is_relevant(node) || path.property != "container" {
            return;
        }
        if let Some(old_container) = old.as_id() {
            let old_container = old_container.to_string();
            self.unlink_container(&old_container, node.id());
        }
        self.link(node);
    }

    fn on_update(&mut self, _node: &Node, _path: &PropertyPath, _diff: &Diff) {
        // offset updates do not move bucket membership
    }

    fn clear(&mut self) {
        self.by_id.clear();
        self.by_container.clear();
    }
}
