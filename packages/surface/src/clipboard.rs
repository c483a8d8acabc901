//! # Clipboard Interface
//!
//! The core treats HTML import/export as opaque strategies supplied by the
//! host: an importer turns pasted HTML into a document fragment (nodes plus
//! annotations), an exporter renders a fragment back to HTML. No codec
//! ships here.

use crate::errors::SurfaceResult;
use substance_model::Node;

/// A detached slice of document content: content nodes plus the
/// annotations anchored on them. Ids are fragment-local until the host
/// re-ids them on insert.
#[derive(Debug, Clone, Default)]
pub struct DocumentFragment {
    pub nodes: Vec<Node>,
    pub annotations: Vec<Node>,
}

impl DocumentFragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.annotations.is_empty()
    }
}

/// Paste strategy: HTML in, fragment out.
pub trait HtmlImporter {
    fn import_html(&self, html: &str) -> SurfaceResult<DocumentFragment>;
}

/// Copy strategy: fragment in, HTML out.
pub trait HtmlExporter {
    fn export_html(&self, fragment: &DocumentFragment) -> SurfaceResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainText;

    impl HtmlExporter for PlainText {
        fn export_html(&self, fragment: &DocumentFragment) -> SurfaceResult<String> {
            Ok(fragment
                .nodes
                .iter()
                .filter_map(|node| node.text("content"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    #[test]
    fn test_exporter_strategy_shape() {
        let fragment = DocumentFragment {
            nodes: vec![
                Node::new("f1", "paragraph").with("content", "Hello"),
                Node::new("f2", "paragraph").with("content", "World"),
            ],
            annotations: Vec::new(),
        };
        assert_eq!(PlainText.export_html(&fragment).unwrap(), "Hello\nWorld");
        assert!(DocumentFragment::default().is_empty());
    }
}
