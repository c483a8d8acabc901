//! Surface-level mapping between DOM selections and model selections.

use std::cell::RefCell;
use std::rc::Rc;
use substance_model::{Coordinate, PropertyPath, Selection};
use substance_surface::{
    dom_to_model, model_to_dom, Direction, DomNode, DomPoint, NodeId, Surface, SurfaceTree,
};

fn content(id: &str) -> PropertyPath {
    PropertyPath::new(id, "content")
}

/// Two paragraphs with wrapped annotations and external decorations:
///
/// ```text
/// <div>
///   <p><span data-external="1">• </span>
///      <span data-path="p1.content">Hello <b>World</b></span></p>
///   <p><span data-path="p2.content"><i>Sec</i>ond</span></p>
/// </div>
/// ```
fn two_paragraphs() -> SurfaceTree {
    SurfaceTree::new(
        DomNode::element("div")
            .with_child(
                DomNode::element("p")
                    .with_child(DomNode::external_span().with_text("• "))
                    .with_child(
                        DomNode::property_span(&content("p1"))
                            .with_text("Hello ")
                            .with_child(DomNode::element("b").with_text("World")),
                    ),
            )
            .with_child(
                DomNode::element("p").with_child(
                    DomNode::property_span(&content("p2"))
                        .with_child(DomNode::element("i").with_text("Sec"))
                        .with_text("ond"),
                ),
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
fn test_wrapped_annotation_offsets_are_depth_first() {
    let tree = two_paragraphs();
    let world = text_node(&tree, "World");

    // "World" starts after "Hello " (6 chars)
    let coord = dom_to_model(&tree, DomPoint::new(world, 3), Direction::default()).unwrap();
    assert_eq!(coord, Coordinate::new(content("p1"), 9));

    let point = model_to_dom(&tree, &coord).unwrap();
    assert_eq!(point, DomPoint::new(world, 3));
}

#[test]
fn test_roundtrip_over_every_offset_of_both_properties() {
    let tree = two_paragraphs();
    for (id, len) in [("p1", 11), ("p2", 6)] {
        for offset in 0..=len {
            let coord = Coordinate::new(content(id), offset);
            let point = model_to_dom(&tree, &coord).unwrap();
            let back = dom_to_model(&tree, point, Direction::default()).unwrap();
            assert_eq!(back, coord, "offset {} of {}", offset, id);
        }
    }
}

#[test]
fn test_point_in_leading_decoration_maps_to_property_start() {
    let tree = two_paragraphs();
    let bullet = text_node(&tree, "• ");

    // the bullet has no data-path ancestor; forward search lands on p1:0
    let coord = dom_to_model(&tree, DomPoint::new(bullet, 1), Direction::Forward).unwrap();
    assert_eq!(coord, Coordinate::new(content("p1"), 0));
}

#[test]
fn test_property_selection_mapping_and_reversal() {
    let tree = two_paragraphs();
    let hello = text_node(&tree, "Hello ");
    let world = text_node(&tree, "World");
    let surface = Surface::new(tree);

    // forward drag: anchor before focus
    let sel = surface.map_dom_selection(DomPoint::new(hello, 2), DomPoint::new(world, 1));
    let Selection::Property(sel) = sel else {
        panic!("expected property selection");
    };
    assert_eq!(sel.path, content("p1"));
    assert_eq!((sel.start_offset, sel.end_offset), (2, 7));
    assert!(!sel.reversed);

    // backward drag: same range, reversed
    let sel = surface.map_dom_selection(DomPoint::new(world, 1), DomPoint::new(hello, 2));
    let Selection::Property(sel) = sel else {
        panic!("expected property selection");
    };
    assert_eq!((sel.start_offset, sel.end_offset), (2, 7));
    assert!(sel.reversed);
}

#[test]
fn test_container_selection_mapping() {
    let tree = two_paragraphs();
    let hello = text_node(&tree, "Hello ");
    let ond = text_node(&tree, "ond");
    let surface = Surface::new(tree).with_container("body");

    let sel = surface.map_dom_selection(DomPoint::new(ond, 1), DomPoint::new(hello, 2));
    let Selection::Container(sel) = sel else {
        panic!("expected container selection");
    };
    assert_eq!(sel.container, "body");
    assert_eq!(sel.start_path, content("p1"));
    assert_eq!(sel.start_offset, 2);
    assert_eq!(sel.end_path, content("p2"));
    assert_eq!(sel.end_offset, 4); // "Sec" (3) + 1
    assert!(sel.reversed);
}

#[test]
fn test_cross_property_selection_without_container_is_null() {
    let tree = two_paragraphs();
    let hello = text_node(&tree, "Hello ");
    let ond = text_node(&tree, "ond");
    let surface = Surface::new(tree);

    let sel = surface.map_dom_selection(DomPoint::new(hello, 0), DomPoint::new(ond, 0));
    assert!(sel.is_null());
}

#[test]
fn test_render_selection_honors_reversed() {
    let tree = two_paragraphs();
    let hello = text_node(&tree, "Hello ");
    let world = text_node(&tree, "World");
    let surface = Surface::new(tree);

    let sel = surface.map_dom_selection(DomPoint::new(world, 1), DomPoint::new(hello, 2));
    let (anchor, focus) = surface.render_selection(&sel).unwrap();
    // reversed selection renders anchor at the end, focus at the start
    assert_eq!(anchor, DomPoint::new(world, 1));
    assert_eq!(focus, DomPoint::new(hello, 2));

    assert!(surface.render_selection(&Selection::Null).is_err());
}

#[test]
fn test_unmount_detaches_selection_listeners() {
    let tree = two_paragraphs();
    let hello = text_node(&tree, "Hello ");
    let mut surface = Surface::new(tree);
    let heard = Rc::new(RefCell::new(0));

    surface.mount();
    let sink = heard.clone();
    surface.on_selection_changed(Box::new(move |_| {
        *sink.borrow_mut() += 1;
    }));

    surface.report_dom_selection(DomPoint::new(hello, 0), DomPoint::new(hello, 2));
    assert_eq!(*heard.borrow(), 1);

    surface.unmount();
    surface.report_dom_selection(DomPoint::new(hello, 0), DomPoint::new(hello, 2));
    assert_eq!(*heard.borrow(), 1);
}
