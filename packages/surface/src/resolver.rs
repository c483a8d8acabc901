//! # Coordinate Resolver
//!
//! Maps between DOM points and model coordinates within a surface.
//!
//! ## DOM → model
//!
//! Walk up from the DOM node to the nearest `data-path` ancestor; the model
//! offset is the summed character length of all preceding non-external text
//! descendants within that ancestor. A point with no property ancestor
//! falls back to **coordinate search**: the nearest property boundary in
//! the requested direction (forward → offset 0 of the next property, left →
//! end offset of the previous one).
//!
//! ## Model → DOM
//!
//! Locate the `data-path` element, then walk its non-external text
//! descendants accumulating offsets until the target is reached. The
//! result is the canonical text-node form; an empty property resolves to
//! `(element, 0)`.

use crate::dom::{NodeId, SurfaceTree};
use crate::errors::{SurfaceError, SurfaceResult};
use substance_model::Coordinate;
use tracing::debug;

/// Search direction for points outside any property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Land on offset 0 of the next property.
    #[default]
    Forward,
    /// Land on the end offset of the previous property.
    Left,
}

/// A DOM position: a node plus an offset (character offset in a text node,
/// child index in an element).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Resolve a DOM point to a model coordinate.
pub fn dom_to_model(
    tree: &SurfaceTree,
    point: DomPoint,
    direction: Direction,
) -> SurfaceResult<Coordinate> {
    tree.check(point.node)?;
    if let Some((property, path)) = tree.property_ancestor(point.node) {
        let offset = offset_within(tree, property, point);
        return Ok(Coordinate::new(path, offset));
    }
    debug!("point outside any property; searching {:?}", direction);
    coordinate_search(tree, point, direction)
}

/// Resolve a model coordinate to its canonical DOM point.
pub fn model_to_dom(tree: &SurfaceTree, coord: &Coordinate) -> SurfaceResult<DomPoint> {
    let property = tree.find_property(&coord.path)?;
    let mut acc = 0;
    for (id, external, len) in tree.text_descendants(property) {
        if external {
            continue;
        }
        if coord.offset <= acc + len {
            return Ok(DomPoint::new(id, coord.offset - acc));
        }
        acc += len;
    }
    if coord.offset == acc {
        // empty property: the wrapping element stands in for a text node
        return Ok(DomPoint::new(property, 0));
    }
    Err(SurfaceError::OffsetOutOfRange {
        path: coord.path.to_string(),
        offset: coord.offset,
        len: acc,
    })
}

/// Model offset of a DOM point known to sit under `property`: the summed
/// length of non-external text before the point. Points inside external
/// spans collapse to the boundary (the normal span's offset wins).
fn offset_within(tree: &SurfaceTree, property: NodeId, point: DomPoint) -> usize {
    let order = tree.subtree(property);
    let position = |id: NodeId| order.iter().position(|n| *n == id);

    let (limit, local) = if tree.is_text(point.node) {
        let local = if tree.in_external(point.node, property) {
            0
        } else {
            point.offset.min(tree.text_len(point.node))
        };
        (position(point.node).unwrap_or(order.len()), local)
    } else {
        (element_boundary(tree, point, &position).unwrap_or(order.len()), 0)
    };

    let mut acc = 0;
    for id in order.iter().take(limit) {
        if tree.is_text(*id) && !tree.in_external(*id, property) {
            acc += tree.text_len(*id);
        }
    }
    acc + local
}

/// Pre-order index of the boundary an element point denotes: before its
/// `offset`-th child, or after its whole subtree when the offset is past
/// the last child.
fn element_boundary(
    tree: &SurfaceTree,
    point: DomPoint,
    position: &dyn Fn(NodeId) -> Option<usize>,
) -> Option<usize> {
    let children = tree.children(point.node);
    if point.offset < children.len() {
        position(children[point.offset])
    } else {
        let subtree = tree.subtree(point.node);
        subtree.last().and_then(|last| position(*last)).map(|i| i + 1)
    }
}

fn coordinate_search(
    tree: &SurfaceTree,
    point: DomPoint,
    direction: Direction,
) -> SurfaceResult<Coordinate> {
    let order = tree.document_order();
    let position = |id: NodeId| order.iter().position(|n| *n == id);

    let point_pos = if tree.is_element(point.node) {
        element_boundary(tree, point, &position).unwrap_or(order.len())
    } else {
        position(point.node).unwrap_or(order.len())
    };

    let properties = tree.properties();
    let found = match direction {
        Direction::Forward => properties
            .iter()
            .find(|(id, _)| position(*id).map(|p| p >= point_pos).unwrap_or(false))
            .map(|(_, path)| Coordinate::new(path.clone(), 0)),
        Direction::Left => properties
            .iter()
            .rev()
            .find(|(id, _)| position(*id).map(|p| p < point_pos).unwrap_or(false))
            .map(|(id, path)| Coordinate::new(path.clone(), tree.property_len(*id))),
    };
    found.ok_or(SurfaceError::CoordinateNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomNode;
    use substance_model::PropertyPath;

    fn content(id: &str) -> PropertyPath {
        PropertyPath::new(id, "content")
    }

    /// `<span data-path="p1.content"><span>ab</span><span data-external="1">·</span><span>cd</span></span>`
    fn annotated_tree() -> SurfaceTree {
        SurfaceTree::new(
            DomNode::element("div").with_child(
                DomNode::property_span(&content("p1"))
                    .with_child(DomNode::element("span").with_text("ab"))
                    .with_child(DomNode::external_span().with_text("·"))
                    .with_child(DomNode::element("span").with_text("cd")),
            ),
        )
    }

    fn text_node(tree: &SurfaceTree, content: &str) -> NodeId {
        tree.document_order()
            .into_iter()
            .find(|id| tree.text(*id) == Some(content))
            .unwrap()
    }

    #[test]
    fn test_externals_are_excluded_from_offsets() {
        let tree = annotated_tree();
        let cd = text_node(&tree, "cd");

        let coord = dom_to_model(&tree, DomPoint::new(cd, 1), Direction::default()).unwrap();
        assert_eq!(coord, Coordinate::new(content("p1"), 3));

        // a point inside the external span collapses to the boundary,
        // which is the normal span's offset
        let dot = text_node(&tree, "·");
        let coord = dom_to_model(&tree, DomPoint::new(dot, 1), Direction::default()).unwrap();
        assert_eq!(coord.offset, 2);
    }

    #[test]
    fn test_element_offsets_at_span_boundaries() {
        let tree = annotated_tree();
        let property = tree.find_property(&content("p1")).unwrap();

        // before first child
        let coord = dom_to_model(&tree, DomPoint::new(property, 0), Direction::default()).unwrap();
        assert_eq!(coord.offset, 0);

        // between "ab" and the external span, and between the external
        // span and "cd": both boundaries are model offset 2
        for child_offset in [1, 2] {
            let coord =
                dom_to_model(&tree, DomPoint::new(property, child_offset), Direction::default())
                    .unwrap();
            assert_eq!(coord.offset, 2);
        }

        // past the last child: end of property
        let coord = dom_to_model(&tree, DomPoint::new(property, 3), Direction::default()).unwrap();
        assert_eq!(coord.offset, 4);
    }

    #[test]
    fn test_model_to_dom_canonical_form() {
        let tree = annotated_tree();
        let ab = text_node(&tree, "ab");
        let cd = text_node(&tree, "cd");

        assert_eq!(
            model_to_dom(&tree, &Coordinate::new(content("p1"), 0)).unwrap(),
            DomPoint::new(ab, 0)
        );
        // boundary offsets resolve into the earlier normal span
        assert_eq!(
            model_to_dom(&tree, &Coordinate::new(content("p1"), 2)).unwrap(),
            DomPoint::new(ab, 2)
        );
        assert_eq!(
            model_to_dom(&tree, &Coordinate::new(content("p1"), 3)).unwrap(),
            DomPoint::new(cd, 1)
        );
        // end-of-property is valid
        assert_eq!(
            model_to_dom(&tree, &Coordinate::new(content("p1"), 4)).unwrap(),
            DomPoint::new(cd, 2)
        );
        assert!(matches!(
            model_to_dom(&tree, &Coordinate::new(content("p1"), 5)),
            Err(SurfaceError::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn test_roundtrip_is_canonical() {
        let tree = annotated_tree();
        for offset in 0..=4 {
            let coord = Coordinate::new(content("p1"), offset);
            let point = model_to_dom(&tree, &coord).unwrap();
            let back = dom_to_model(&tree, point, Direction::default()).unwrap();
            assert_eq!(back, coord);
        }
    }

    #[test]
    fn test_empty_property_resolves_to_offset_zero() {
        let tree = SurfaceTree::new(
            DomNode::element("div").with_child(DomNode::property_span(&content("p1"))),
        );
        let property = tree.find_property(&content("p1")).unwrap();

        let coord = dom_to_model(&tree, DomPoint::new(property, 0), Direction::default()).unwrap();
        assert_eq!(coord, Coordinate::new(content("p1"), 0));

        let point = model_to_dom(&tree, &Coordinate::new(content("p1"), 0)).unwrap();
        assert_eq!(point, DomPoint::new(property, 0));
    }

    #[test]
    fn test_coordinate_search_between_paragraphs() {
        // <div> <div class="chrome"/> <p data-path=p1>Hello</p> <hr/> <p data-path=p2>World</p> </div>
        let tree = SurfaceTree::new(
            DomNode::element("div")
                .with_child(DomNode::element("div"))
                .with_child(DomNode::property_span(&content("p1")).with_text("Hello"))
                .with_child(DomNode::element("hr"))
                .with_child(DomNode::property_span(&content("p2")).with_text("World")),
        );
        let hr = tree
            .document_order()
            .into_iter()
            .find(|id| tree.tag(*id) == Some("hr"))
            .unwrap();

        // forward: offset 0 of the next property
        let coord = dom_to_model(&tree, DomPoint::new(hr, 0), Direction::Forward).unwrap();
        assert_eq!(coord, Coordinate::new(content("p2"), 0));

        // left: end offset of the previous property
        let coord = dom_to_model(&tree, DomPoint::new(hr, 0), Direction::Left).unwrap();
        assert_eq!(coord, Coordinate::new(content("p1"), 5));

        // chrome before any property: forward finds p1, left finds nothing
        let chrome = tree.children(tree.root())[0];
        let coord = dom_to_model(&tree, DomPoint::new(chrome, 0), Direction::Forward).unwrap();
        assert_eq!(coord, Coordinate::new(content("p1"), 0));
        assert_eq!(
            dom_to_model(&tree, DomPoint::new(chrome, 0), Direction::Left),
            Err(SurfaceError::CoordinateNotFound)
        );
    }
}
