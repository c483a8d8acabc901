//! # Selections
//!
//! Model-level selections: a pair of coordinates on one text property
//! ([`PropertySelection`]) or spanning children of a container
//! ([`ContainerSelection`]). The null selection is its own variant.
//!
//! `reversed` records anchor/focus order for the UI; range math ignores it.
//! Container range math needs the container's current child order, supplied
//! as a [`ContainerOrder`].

use crate::container::Container;
use crate::property::PropertyPath;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A position in the model: a text property plus a character offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub path: PropertyPath,
    pub offset: usize,
}

impl Coordinate {
    pub fn new(path: PropertyPath, offset: usize) -> Self {
        Self { path, offset }
    }
}

/// Which end of a selection to collapse to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseTo {
    Start,
    End,
}

/// Selection with both endpoints on the same property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySelection {
    pub path: PropertyPath,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub reversed: bool,
}

impl PropertySelection {
    pub fn new(path: PropertyPath, start_offset: usize, end_offset: usize) -> Self {
        Self {
            path,
            start_offset,
            end_offset,
            reversed: false,
        }
    }

    pub fn collapsed(path: PropertyPath, offset: usize) -> Self {
        Self::new(path, offset, offset)
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.start_offset == self.end_offset
    }

    /// Closed-interval intersection on the same property.
    pub fn overlaps(&self, other: &PropertySelection) -> bool {
        self.path == other.path
            && self.start_offset <= other.end_offset
            && self.end_offset >= other.start_offset
    }

    pub fn contains(&self, other: &PropertySelection) -> bool {
        self.path == other.path
            && self.start_offset <= other.start_offset
            && self.end_offset >= other.end_offset
    }

    pub fn start(&self) -> Coordinate {
        Coordinate::new(self.path.clone(), self.start_offset)
    }

    pub fn end(&self) -> Coordinate {
        Coordinate::new(self.path.clone(), self.end_offset)
    }
}

/// Selection spanning children of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSelection {
    pub container: String,
    pub start_path: PropertyPath,
    pub start_offset: usize,
    pub end_path: PropertyPath,
    pub end_offset: usize,
    #[serde(default)]
    pub reversed: bool,
}

impl ContainerSelection {
    pub fn new(
        container: impl Into<String>,
        start_path: PropertyPath,
        start_offset: usize,
        end_path: PropertyPath,
        end_offset: usize,
    ) -> Self {
        Self {
            container: container.into(),
            start_path,
            start_offset,
            end_path,
            end_offset,
            reversed: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.start_path == self.end_path && self.start_offset == self.end_offset
    }

    pub fn start(&self) -> Coordinate {
        Coordinate::new(self.start_path.clone(), self.start_offset)
    }

    pub fn end(&self) -> Coordinate {
        Coordinate::new(self.end_path.clone(), self.end_offset)
    }
}

/// Snapshot of a container's child order, used to compare coordinates on
/// different children. Coordinates on nodes outside the container do not
/// participate in range math.
#[derive(Debug, Clone, Default)]
pub struct ContainerOrder {
    positions: HashMap<String, usize>,
}

impl ContainerOrder {
    pub fn new(ids: &[String]) -> Self {
        Self {
            positions: ids
                .iter()
                .enumerate()
                .map(|(pos, id)| (id.clone(), pos))
                .collect(),
        }
    }

    pub fn from_container(container: &Container<'_>) -> Self {
        Self::new(container.ids())
    }

    /// Sort key of a coordinate within this container.
    pub fn key(&self, coord: &Coordinate) -> Option<(usize, usize)> {
        self.positions
            .get(&coord.path.node_id)
            .map(|pos| (*pos, coord.offset))
    }

    pub fn cmp(&self, a: &Coordinate, b: &Coordinate) -> Option<Ordering> {
        Some(self.key(a)?.cmp(&self.key(b)?))
    }
}

/// A model selection: null, property-scoped, or container-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Selection {
    Null,
    Property(PropertySelection),
    Container(ContainerSelection),
}

impl Selection {
    pub fn is_null(&self) -> bool {
        matches!(self, Selection::Null)
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Null => true,
            Selection::Property(sel) => sel.is_collapsed(),
            Selection::Container(sel) => sel.is_collapsed(),
        }
    }

    pub fn is_reversed(&self) -> bool {
        match self {
            Selection::Null => false,
            Selection::Property(sel) => sel.reversed,
            Selection::Container(sel) => sel.reversed,
        }
    }

    /// Collapse to one end. A collapsed container selection degenerates to
    /// a property selection at that anchor.
    pub fn collapse(&self, to: CollapseTo) -> Selection {
        match self {
            Selection::Null => Selection::Null,
            Selection::Property(sel) => {
                let offset = match to {
                    CollapseTo::Start => sel.start_offset,
                    CollapseTo::End => sel.end_offset,
                };
                Selection::Property(PropertySelection::collapsed(sel.path.clone(), offset))
            }
            Selection::Container(sel) => {
                let coord = match to {
                    CollapseTo::Start => sel.start(),
                    CollapseTo::End => sel.end(),
                };
                Selection::Property(PropertySelection::collapsed(coord.path, coord.offset))
            }
        }
    }

    fn range(&self) -> Option<(Coordinate, Coordinate)> {
        match self {
            Selection::Null => None,
            Selection::Property(sel) => Some((sel.start(), sel.end())),
            Selection::Container(sel) => Some((sel.start(), sel.end())),
        }
    }

    /// Closed-interval overlap within a container's coordinate space.
    /// Property selections on the same path short-circuit without order
    /// lookups; the null selection overlaps nothing.
    pub fn overlaps(&self, other: &Selection, order: &ContainerOrder) -> bool {
        if let (Selection::Property(a), Selection::Property(b)) = (self, other) {
            if a.path == b.path {
                return a.overlaps(b);
            }
        }
        let (Some((a_start, a_end)), Some((b_start, b_end))) = (self.range(), other.range()) else {
            return false;
        };
        let (Some(a0), Some(a1), Some(b0), Some(b1)) = (
            order.key(&a_start),
            order.key(&a_end),
            order.key(&b_start),
            order.key(&b_end),
        ) else {
            return false;
        };
        a0 <= b1 && a1 >= b0
    }

    pub fn contains(&self, other: &Selection, order: &ContainerOrder) -> bool {
        if let (Selection::Property(a), Selection::Property(b)) = (self, other) {
            if a.path == b.path {
                return a.contains(b);
            }
        }
        let (Some((a_start, a_end)), Some((b_start, b_end))) = (self.range(), other.range()) else {
            return false;
        };
        let (Some(a0), Some(a1), Some(b0), Some(b1)) = (
            order.key(&a_start),
            order.key(&a_end),
            order.key(&b_start),
            order.key(&b_end),
        ) else {
            return false;
        };
        a0 <= b0 && a1 >= b1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(id: &str) -> PropertyPath {
        PropertyPath::new(id, "content")
    }

    fn order() -> ContainerOrder {
        ContainerOrder::new(&["p1".to_string(), "p2".to_string(), "p3".to_string()])
    }

    #[test]
    fn test_property_overlap_is_closed() {
        let a = PropertySelection::new(path("p1"), 6, 11);
        assert!(a.overlaps(&PropertySelection::new(path("p1"), 0, 6)));
        assert!(a.overlaps(&PropertySelection::new(path("p1"), 11, 14)));
        assert!(!a.overlaps(&PropertySelection::new(path("p1"), 12, 14)));
        assert!(!a.overlaps(&PropertySelection::new(path("p2"), 6, 11)));
        // zero-length at a covered offset
        assert!(a.overlaps(&PropertySelection::collapsed(path("p1"), 8)));
    }

    #[test]
    fn test_collapse_directions() {
        let sel = Selection::Property(PropertySelection::new(path("p1"), 6, 11).reversed());
        let start = sel.collapse(CollapseTo::Start);
        assert_eq!(
            start,
            Selection::Property(PropertySelection::collapsed(path("p1"), 6))
        );
        assert!(start.is_collapsed());
        assert!(!start.is_reversed());

        let end = sel.collapse(CollapseTo::End);
        assert_eq!(
            end,
            Selection::Property(PropertySelection::collapsed(path("p1"), 11))
        );
    }

    #[test]
    fn test_container_collapse_degenerates_to_property() {
        let sel = Selection::Container(ContainerSelection::new(
            "body",
            path("p1"),
            3,
            path("p3"),
            2,
        ));
        assert_eq!(
            sel.collapse(CollapseTo::End),
            Selection::Property(PropertySelection::collapsed(path("p3"), 2))
        );
    }

    #[test]
    fn test_container_overlap_uses_document_order() {
        let order = order();
        let span = Selection::Container(ContainerSelection::new(
            "body",
            path("p1"),
            3,
            path("p2"),
            5,
        ));
        let inside = Selection::Property(PropertySelection::new(path("p2"), 0, 2));
        let after = Selection::Property(PropertySelection::new(path("p3"), 0, 2));
        assert!(span.overlaps(&inside, &order));
        assert!(inside.overlaps(&span, &order));
        assert!(!span.overlaps(&after, &order));
        assert!(span.contains(&inside, &order));
        assert!(!inside.contains(&span, &order));
    }

    #[test]
    fn test_unknown_node_never_overlaps() {
        let order = order();
        let span = Selection::Container(ContainerSelection::new(
            "body",
            path("p1"),
            0,
            path("p3"),
            2,
        ));
        let detached = Selection::Property(PropertySelection::new(path("title"), 0, 2));
        assert!(!span.overlaps(&detached, &order));
    }

    #[test]
    fn test_null_selection_is_inert() {
        let order = order();
        let sel = Selection::Property(PropertySelection::new(path("p1"), 0, 2));
        assert!(!Selection::Null.overlaps(&sel, &order));
        assert!(Selection::Null.is_collapsed());
        assert_eq!(Selection::Null.collapse(CollapseTo::Start), Selection::Null);
    }

    #[test]
    fn test_reversed_does_not_affect_range_math() {
        let a = PropertySelection::new(path("p1"), 2, 8);
        let b = PropertySelection::new(path("p1"), 2, 8).reversed();
        assert!(a.overlaps(&b));
        assert!(a.contains(&b));
        assert_ne!(a, b); // but equality sees it
    }

    #[test]
    fn test_selection_serde_roundtrip() {
        let sel = Selection::Container(
            ContainerSelection::new("body", path("p1"), 3, path("p2"), 5).reversed(),
        );
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["type"], "container");
        let back: Selection = serde_json::from_value(json).unwrap();
        assert_eq!(back, sel);
    }
}
