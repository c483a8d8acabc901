//! # Substance Surface
//!
//! Surface abstraction for editable views: a model of the contenteditable
//! subtree, the DOM↔model coordinate resolver, and selection mapping in
//! both directions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host view: renders nodes into a DOM subtree │
//! │   property leaves carry data-path="id.prop" │
//! │   decorations carry data-external="1"       │
//! └─────────────────────────────────────────────┘
//!                     ↕
//! ┌─────────────────────────────────────────────┐
//! │ surface: DOM points ↔ model coordinates     │
//! │  - resolver (walk up, sum non-external text)│
//! │  - coordinate search across boundaries      │
//! │  - selection mapping (property / container) │
//! └─────────────────────────────────────────────┘
//!                     ↕
//! ┌─────────────────────────────────────────────┐
//! │ model: coordinates and selections           │
//! └─────────────────────────────────────────────┘
//! ```

mod clipboard;
mod dom;
mod errors;
mod resolver;
mod surface;

pub use clipboard::{DocumentFragment, HtmlExporter, HtmlImporter};
pub use dom::{DomNode, NodeId, SurfaceTree, ATTR_EXTERNAL, ATTR_PATH};
pub use errors::{SurfaceError, SurfaceResult};
pub use resolver::{dom_to_model, model_to_dom, Direction, DomPoint};
pub use surface::Surface;
