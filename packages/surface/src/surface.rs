//! # Surface
//!
//! Binds an editable DOM subtree to the document via coordinate
//! resolution: DOM selection reports come in, model selections go out, and
//! model selections are rendered back into DOM points for the host to
//! apply.
//!
//! The surface scopes its listener registrations to its mount state:
//! attach on mount, detach on unmount.

use crate::dom::{NodeId, SurfaceTree};
use crate::errors::{SurfaceError, SurfaceResult};
use crate::resolver::{dom_to_model, model_to_dom, Direction, DomPoint};
use substance_model::{
    ContainerSelection, Coordinate, PropertySelection, Selection,
};
use tracing::debug;

type SelectionListener = Box<dyn FnMut(&Selection)>;

pub struct Surface {
    tree: SurfaceTree,
    container: Option<String>,
    mounted: bool,
    selection_listeners: Vec<SelectionListener>,
}

impl Surface {
    pub fn new(tree: SurfaceTree) -> Self {
        Self {
            tree,
            container: None,
            mounted: false,
            selection_listeners: Vec::new(),
        }
    }

    /// Container backing cross-property selections on this surface.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn tree(&self) -> &SurfaceTree {
        &self.tree
    }

    /// Swap in a re-rendered subtree (the host re-rendered the view).
    pub fn set_tree(&mut self, tree: SurfaceTree) {
        self.tree = tree;
    }

    // ---- mount lifecycle -------------------------------------------------

    pub fn mount(&mut self) {
        self.mounted = true;
    }

    /// Unmount: listener registrations are scoped to the mount and dropped
    /// here.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.selection_listeners.clear();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn on_selection_changed(&mut self, listener: SelectionListener) {
        self.selection_listeners.push(listener);
    }

    // ---- DOM ↔ model selection -------------------------------------------

    /// Resolve one DOM point; a miss is a null-selection signal, not an
    /// error.
    pub fn resolve_point(&self, point: DomPoint, direction: Direction) -> Option<Coordinate> {
        dom_to_model(&self.tree, point, direction).ok()
    }

    /// Map a reported DOM selection (anchor, focus) to a model selection.
    /// Unresolvable points yield [`Selection::Null`]; a cross-property
    /// selection without a configured container does too.
    pub fn map_dom_selection(&self, anchor: DomPoint, focus: DomPoint) -> Selection {
        let (Some(anchor), Some(focus)) = (
            self.resolve_point(anchor, Direction::default()),
            self.resolve_point(focus, Direction::default()),
        ) else {
            return Selection::Null;
        };

        if anchor.path == focus.path {
            let reversed = focus.offset < anchor.offset;
            let (start, end) = if reversed {
                (focus.offset, anchor.offset)
            } else {
                (anchor.offset, focus.offset)
            };
            let mut sel = PropertySelection::new(anchor.path, start, end);
            sel.reversed = reversed;
            return Selection::Property(sel);
        }

        let Some(container) = &self.container else {
            debug!("cross-property selection without a container; dropping");
            return Selection::Null;
        };
        let Some(reversed) = self.focus_precedes_anchor(&anchor, &focus) else {
            return Selection::Null;
        };
        let (start, end) = if reversed {
            (focus, anchor)
        } else {
            (anchor, focus)
        };
        let mut sel = ContainerSelection::new(
            container.clone(),
            start.path,
            start.offset,
            end.path,
            end.offset,
        );
        sel.reversed = reversed;
        Selection::Container(sel)
    }

    /// Map a DOM selection and notify listeners while mounted.
    pub fn report_dom_selection(&mut self, anchor: DomPoint, focus: DomPoint) -> Selection {
        let sel = self.map_dom_selection(anchor, focus);
        if self.mounted {
            for listener in self.selection_listeners.iter_mut() {
                listener(&sel);
            }
        }
        sel
    }

    /// Render a model selection as DOM `(anchor, focus)` points, honoring
    /// `reversed`.
    pub fn render_selection(&self, sel: &Selection) -> SurfaceResult<(DomPoint, DomPoint)> {
        match sel {
            Selection::Null => Err(SurfaceError::CoordinateNotFound),
            Selection::Property(sel) => {
                let start = model_to_dom(
                    &self.tree,
                    &Coordinate::new(sel.path.clone(), sel.start_offset),
                )?;
                let end = model_to_dom(
                    &self.tree,
                    &Coordinate::new(sel.path.clone(), sel.end_offset),
                )?;
                Ok(if sel.reversed { (end, start) } else { (start, end) })
            }
            Selection::Container(sel) => {
                let start = model_to_dom(&self.tree, &sel.start())?;
                let end = model_to_dom(&self.tree, &sel.end())?;
                Ok(if sel.reversed { (end, start) } else { (start, end) })
            }
        }
    }

    /// Document-order comparison of two coordinates via their property
    /// elements; `None` when either path is not rendered on this surface.
    fn focus_precedes_anchor(&self, anchor: &Coordinate, focus: &Coordinate) -> Option<bool> {
        let anchor_pos = self.property_position(&anchor.path)?;
        let focus_pos = self.property_position(&focus.path)?;
        Some((focus_pos, focus.offset) < (anchor_pos, anchor.offset))
    }

    fn property_position(&self, path: &substance_model::PropertyPath) -> Option<usize> {
        let properties = self.tree.properties();
        properties
            .iter()
            .position(|(_, candidate)| candidate == path)
    }

    /// Node id of the element rendering `path`, for host-side DOM work.
    pub fn property_element(&self, path: &substance_model::PropertyPath) -> SurfaceResult<NodeId> {
        self.tree.find_property(path)
    }
}
