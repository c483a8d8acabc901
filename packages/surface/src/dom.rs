//! # Surface DOM
//!
//! Lightweight model of the contenteditable subtree a surface is bound to.
//!
//! ## Core Types
//!
//! - [`DomNode`]: builder tree (element or text) used to describe a surface
//! - [`SurfaceTree`]: arena form with parent links, the shape the
//!   coordinate resolver walks
//!
//! ## Markup contract
//!
//! Property leaves carry `data-path="id.prop"`. Decorations that contribute
//! no model offset (list bullets, placeholder text) carry
//! `data-external="1"` and are skipped by all offset math.

use crate::errors::{SurfaceError, SurfaceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use substance_model::PropertyPath;

pub const ATTR_PATH: &str = "data-path";
pub const ATTR_EXTERNAL: &str = "data-external";

/// Builder tree for describing a surface subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DomNode {
    /// HTML element
    Element {
        tag: String,
        attributes: HashMap<String, String>,
        children: Vec<DomNode>,
    },

    /// Text node
    Text { content: String },
}

impl DomNode {
    pub fn element(tag: impl Into<String>) -> Self {
        DomNode::Element {
            tag: tag.into(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        DomNode::Text {
            content: content.into(),
        }
    }

    /// Span bound to a model property (`data-path`).
    pub fn property_span(path: &PropertyPath) -> Self {
        DomNode::element("span").with_attr(ATTR_PATH, path.to_string())
    }

    /// Decoration span excluded from offset math (`data-external`).
    pub fn external_span() -> Self {
        DomNode::element("span").with_attr(ATTR_EXTERNAL, "1")
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let DomNode::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        if let DomNode::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.with_child(DomNode::text(content))
    }
}

/// Handle into a [`SurfaceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: HashMap<String, String>,
        children: Vec<NodeId>,
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone)]
struct ArenaNode {
    parent: Option<NodeId>,
    data: NodeData,
}

/// Arena form of a surface subtree: stable ids, parent links, document
/// order by construction.
#[derive(Debug, Clone)]
pub struct SurfaceTree {
    nodes: Vec<ArenaNode>,
    root: NodeId,
}

impl SurfaceTree {
    pub fn new(root: DomNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let root_id = tree.intern(root, None);
        tree.root = root_id;
        tree
    }

    fn intern(&mut self, node: DomNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        match node {
            DomNode::Element {
                tag,
                attributes,
                children,
            } => {
                self.nodes.push(ArenaNode {
                    parent,
                    data: NodeData::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    },
                });
                let child_ids: Vec<NodeId> = children
                    .into_iter()
                    .map(|child| self.intern(child, Some(id)))
                    .collect();
                if let NodeData::Element { children, .. } = &mut self.nodes[id.0].data {
                    *children = child_ids;
                }
            }
            DomNode::Text { content } => {
                self.nodes.push(ArenaNode {
                    parent,
                    data: NodeData::Text { content },
                });
            }
        }
        id
    }

    fn node(&self, id: NodeId) -> SurfaceResult<&ArenaNode> {
        self.nodes.get(id.0).ok_or(SurfaceError::UnknownNode)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Element { attributes, .. }) => {
                attributes.get(name).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|node| &node.data) {
            Some(NodeData::Text { content }) => Some(content),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|node| &node.data),
            Some(NodeData::Text { .. })
        )
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|node| &node.data),
            Some(NodeData::Element { .. })
        )
    }

    /// Character length of a text node; 0 for elements.
    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map(|s| s.chars().count()).unwrap_or(0)
    }

    /// The model path bound to this element, if any.
    pub fn data_path(&self, id: NodeId) -> Option<PropertyPath> {
        self.attr(id, ATTR_PATH)
            .and_then(|raw| PropertyPath::from_str(raw).ok())
    }

    /// Whether this element is marked as an external decoration.
    pub fn is_external(&self, id: NodeId) -> bool {
        self.attr(id, ATTR_EXTERNAL).is_some()
    }

    /// Whether `id` or any ancestor up to (exclusive) `stop` is external.
    pub fn in_external(&self, id: NodeId, stop: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == stop {
                return false;
            }
            if self.is_external(node) {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Nearest ancestor (inclusive) carrying `data-path`.
    pub fn property_ancestor(&self, id: NodeId) -> Option<(NodeId, PropertyPath)> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(path) = self.data_path(node) {
                return Some((node, path));
            }
            current = self.parent(node);
        }
        None
    }

    /// Depth-first pre-order of the subtree rooted at `id`, root included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            order.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Depth-first pre-order of the whole tree.
    pub fn document_order(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    /// First element bound to `path`, in document order.
    pub fn find_property(&self, path: &PropertyPath) -> SurfaceResult<NodeId> {
        self.document_order()
            .into_iter()
            .find(|id| self.data_path(*id).as_ref() == Some(path))
            .ok_or_else(|| SurfaceError::PathNotFound(path.to_string()))
    }

    /// All property elements in document order.
    pub fn properties(&self) -> Vec<(NodeId, PropertyPath)> {
        self.document_order()
            .into_iter()
            .filter_map(|id| self.data_path(id).map(|path| (id, path)))
            .collect()
    }

    /// Text nodes under `root` in document order, with their external flag
    /// (from any span between the text and `root`) and character length.
    pub fn text_descendants(&self, root: NodeId) -> Vec<(NodeId, bool, usize)> {
        self.subtree(root)
            .into_iter()
            .filter(|id| self.is_text(*id))
            .map(|id| (id, self.in_external(id, root), self.text_len(id)))
            .collect()
    }

    /// Model-addressable text length of a property element: the summed
    /// character count of its non-external text descendants.
    pub fn property_len(&self, property: NodeId) -> usize {
        self.text_descendants(property)
            .iter()
            .filter(|(_, external, _)| !external)
            .map(|(_, _, len)| len)
            .sum()
    }

    fn node_exists(&self, id: NodeId) -> SurfaceResult<()> {
        self.node(id).map(|_| ())
    }

    /// Validate that a foreign handle belongs to this tree.
    pub fn check(&self, id: NodeId) -> SurfaceResult<()> {
        self.node_exists(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SurfaceTree {
        // <div><span data-path="p1.content"><span>ab</span><span data-external="1">·</span><span>cd</span></span></div>
        SurfaceTree::new(
            DomNode::element("div").with_child(
                DomNode::property_span(&PropertyPath::new("p1", "content"))
                    .with_child(DomNode::element("span").with_text("ab"))
                    .with_child(DomNode::external_span().with_text("·"))
                    .with_child(DomNode::element("span").with_text("cd")),
            ),
        )
    }

    #[test]
    fn test_property_lookup_and_parents() {
        let tree = sample();
        let path = PropertyPath::new("p1", "content");
        let property = tree.find_property(&path).unwrap();
        assert_eq!(tree.data_path(property), Some(path.clone()));
        assert_eq!(tree.parent(property), Some(tree.root()));
        assert!(tree
            .find_property(&PropertyPath::new("p9", "content"))
            .is_err());
    }

    #[test]
    fn test_text_descendants_flag_externals() {
        let tree = sample();
        let property = tree
            .find_property(&PropertyPath::new("p1", "content"))
            .unwrap();
        let texts = tree.text_descendants(property);
        assert_eq!(texts.len(), 3);
        assert_eq!(
            texts
                .iter()
                .map(|(id, ext, len)| (tree.text(*id).unwrap(), *ext, *len))
                .collect::<Vec<_>>(),
            vec![("ab", false, 2), ("·", true, 1), ("cd", false, 2)]
        );
        assert_eq!(tree.property_len(property), 4);
    }

    #[test]
    fn test_document_order_is_depth_first() {
        let tree = sample();
        let order = tree.document_order();
        let texts: Vec<&str> = order
            .iter()
            .filter_map(|id| tree.text(*id))
            .collect();
        assert_eq!(texts, vec!["ab", "·", "cd"]);
    }

    #[test]
    fn test_dom_node_serde_roundtrip() {
        let node = DomNode::property_span(&PropertyPath::new("p1", "content"))
            .with_text("Hello")
            .with_child(DomNode::external_span().with_text("·"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "element");
        let back: DomNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
