//! Position descriptors into the rendered content tree.
//!
//! A [`TreeRange`] is an immutable (container, offset) pair at each end,
//! resolved lazily against the tree it was captured from. Live handles are
//! never cached across a mutation boundary; node ids stay valid only for the
//! tree instance they came from, so the serializable form is a [`NodePath`]
//! of child indices from the root.

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

/// A boundary point: a container node plus an offset. For text containers
/// the offset is a byte offset into the text; for element containers it is
/// a child index (DOM boundary-point convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePoint {
    pub container: NodeId,
    pub offset: usize,
}

/// A span of content between two boundary points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRange {
    pub start: TreePoint,
    pub end: TreePoint,
}

impl TreeRange {
    pub fn new(start: TreePoint, end: TreePoint) -> Self {
        TreeRange { start, end }
    }

    /// A zero-width range at a single point (placeholder headings).
    pub fn collapsed(at: TreePoint) -> Self {
        TreeRange { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Resolve both boundary containers against the tree, if still present.
    pub fn resolve<'a>(
        &self,
        doc: &'a Html,
    ) -> Option<(NodeRef<'a, Node>, usize, NodeRef<'a, Node>, usize)> {
        let start = doc.tree.get(self.start.container)?;
        let end = doc.tree.get(self.end.container)?;
        Some((start, self.start.offset, end, self.end.offset))
    }

    /// The text content covered by the range, for diagnostics and tests.
    /// Concatenates every text node between the boundary points, honoring
    /// byte offsets into the boundary text nodes themselves.
    pub fn text_content(&self, doc: &Html) -> Option<String> {
        let (start, start_offset, end, end_offset) = self.resolve(doc)?;

        // Both points in one element container: offsets are child indexes
        // (e.g. a heading's inner span), so gather those children's text.
        if start.id() == end.id() && start.value().is_element() {
            let mut out = String::new();
            for child in start.children().skip(start_offset).take(end_offset.saturating_sub(start_offset)) {
                for node in child.descendants() {
                    if let Some(text) = node.value().as_text() {
                        out.push_str(text);
                    }
                }
            }
            return Some(out);
        }

        let mut out = String::new();
        let mut cursor = Some(start);
        while let Some(node) = cursor {
            if let Some(text) = node.value().as_text() {
                let s: &str = text;
                let from = if node.id() == start.id() { start_offset.min(s.len()) } else { 0 };
                let to = if node.id() == end.id() { end_offset.min(s.len()) } else { s.len() };
                if from < to {
                    out.push_str(&s[from..to]);
                }
            }
            if node.id() == end.id() {
                break;
            }
            cursor = crate::parsing::scan::next_node(node);
        }
        Some(out)
    }
}

/// Root-relative child-index path: the handle-free, serializable address of
/// a node, stable across re-renders of an identical tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn of(node: NodeRef<'_, Node>) -> NodePath {
        let mut path = Vec::new();
        let mut cur = node;
        while let Some(parent) = cur.parent() {
            let index = parent
                .children()
                .position(|c| c.id() == cur.id())
                .unwrap_or(0);
            path.push(index);
            cur = parent;
        }
        path.reverse();
        NodePath(path)
    }

    pub fn resolve(&self, doc: &Html) -> Option<NodeId> {
        let mut cur = doc.tree.root();
        for &index in &self.0 {
            cur = cur.children().nth(index)?;
        }
        Some(cur.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn find_text<'a>(doc: &'a Html, needle: &str) -> NodeRef<'a, Node> {
        doc.tree
            .root()
            .descendants()
            .find(|n| n.value().as_text().is_some_and(|t| t.contains(needle)))
            .expect("text node not found")
    }

    #[test]
    fn test_node_path_roundtrip() {
        let doc = Html::parse_document("<p>a</p><p>b <i>c</i></p>");
        let c = find_text(&doc, "c");
        let path = NodePath::of(c);
        assert_eq!(path.resolve(&doc), Some(c.id()));
    }

    #[test]
    fn test_node_path_resolves_against_identical_tree() {
        let html = "<p>a</p><p>b <i>c</i></p>";
        let first = Html::parse_document(html);
        let second = Html::parse_document(html);
        let path = NodePath::of(find_text(&first, "c"));
        let resolved = path.resolve(&second).unwrap();
        let node = second.tree.get(resolved).unwrap();
        let s: &str = node.value().as_text().unwrap();
        assert_eq!(s, "c");
    }

    #[test]
    fn test_node_path_out_of_bounds() {
        let doc = Html::parse_document("<p>a</p>");
        let path = NodePath(vec![0, 9, 9]);
        assert_eq!(path.resolve(&doc), None);
    }

    #[test]
    fn test_text_content_with_offsets() {
        let doc = Html::parse_document("<p>hello <i>big</i> world</p>");
        let hello = find_text(&doc, "hello");
        let world = find_text(&doc, " world");
        let range = TreeRange::new(
            TreePoint { container: hello.id(), offset: 6 },
            TreePoint { container: world.id(), offset: 6 },
        );
        assert_eq!(range.text_content(&doc).unwrap(), "big worl");
        assert!(!range.is_collapsed());
    }

    #[test]
    fn test_text_content_element_container() {
        let doc = Html::parse_document("<h2><span>Topic</span> title</h2>");
        let h2 = doc
            .tree
            .root()
            .descendants()
            .find(|n| n.value().as_element().is_some_and(|e| e.name() == "h2"))
            .unwrap();
        let range = TreeRange::new(
            TreePoint { container: h2.id(), offset: 0 },
            TreePoint { container: h2.id(), offset: h2.children().count() },
        );
        assert_eq!(range.text_content(&doc).unwrap(), "Topic title");
    }

    #[test]
    fn test_collapsed_range() {
        let doc = Html::parse_document("<p>x</p>");
        let x = find_text(&doc, "x");
        let range = TreeRange::collapsed(TreePoint { container: x.id(), offset: 0 });
        assert!(range.is_collapsed());
        assert_eq!(range.text_content(&doc).unwrap(), "");
    }
}
