//! # Container
//!
//! Read view over a `container` node: an ordered list of child node ids.
//! `show`/`hide` are convenience transforms that compile to list splices on
//! the `nodes` property; they never mutate the node directly, so container
//! edits flow through the same op pipeline as everything else.

use crate::node::Node;
use crate::ops::Diff;

/// Borrowing view over a container node's child order.
#[derive(Debug, Clone, Copy)]
pub struct Container<'a> {
    node: &'a Node,
}

impl<'a> Container<'a> {
    pub fn new(node: &'a Node) -> Self {
        Self { node }
    }

    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn ids(&self) -> &'a [String] {
        self.node.id_list("nodes").unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Position of a child in document order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids().iter().position(|child| child == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> {
        self.ids().iter().map(String::as_str)
    }

    /// Diff that shows `id` at `pos` (appended when `pos` is `None` or past
    /// the end).
    pub fn show_diff(&self, id: impl Into<String>, pos: Option<usize>) -> Diff {
        let len = self.len();
        let pos = pos.map(|p| p.min(len)).unwrap_or(len);
        Diff::insert_at(pos, id)
    }

    /// Diff that hides the first occurrence of `id`, or `None` when the
    /// container does not show it.
    pub fn hide_diff(&self, id: &str) -> Option<Diff> {
        self.position(id).map(|pos| Diff::remove_at(pos, id))
    }
}
