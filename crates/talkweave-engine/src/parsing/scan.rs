//! Tree-walk primitives over the rendered content tree.
//!
//! Pure functions on `ego_tree::NodeRef<scraper::Node>`: document-order
//! traversal, bounded backward walks, and the node predicates the discovery
//! walk is built from. Nothing here holds state or mutates the tree.

use ego_tree::NodeRef;
use scraper::Node;

/// Maximum code points of intervening text the signature detector will walk
/// back through before giving up.
pub const SIGNATURE_SCAN_LIMIT: usize = 100;

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "caption",
    "center",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "html",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Characters that render as nothing: zero-width joiners/markers and the
/// bidirectional controls that copy-paste tends to scatter around timestamps.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200b}', '\u{200c}', '\u{200d}', '\u{200e}', '\u{200f}', '\u{feff}',
];

pub fn tag_name<'a>(node: &NodeRef<'a, Node>) -> Option<&'a str> {
    node.value().as_element().map(|el| el.name())
}

pub fn is_block_element(node: &NodeRef<'_, Node>) -> bool {
    tag_name(node).is_some_and(|tag| BLOCK_TAGS.contains(&tag))
}

/// Heading level 1..=6 when the node is a rendered heading element.
pub fn heading_level(node: &NodeRef<'_, Node>) -> Option<u8> {
    match tag_name(node)? {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Nodes that occupy space in the tree but render as nothing: HTML comments
/// and text consisting solely of zero-width/bidi marker characters.
pub fn is_rendering_transparent(node: &NodeRef<'_, Node>) -> bool {
    if node.value().is_comment() {
        return true;
    }
    if let Some(text) = node.value().as_text() {
        let s: &str = text;
        return !s.is_empty() && s.chars().all(|c| INVISIBLE_CHARS.contains(&c));
    }
    false
}

/// Subtrees that separate comments without being part of any comment:
/// reference lists, block quotations, and the table of contents.
pub fn is_separator(node: &NodeRef<'_, Node>) -> bool {
    let Some(el) = node.value().as_element() else {
        return false;
    };
    match el.name() {
        "blockquote" | "style" | "script" => true,
        _ => {
            el.attr("id") == Some("toc")
                || el.classes().any(|c| {
                    c == "references" || c == "mw-references-wrap" || c == "toc" || c == "mw-toc"
                })
        }
    }
}

/// A leaf that contributes visible content: non-blank text or an image.
pub fn is_content_leaf(node: &NodeRef<'_, Node>) -> bool {
    if is_rendering_transparent(node) {
        return false;
    }
    if let Some(text) = node.value().as_text() {
        let s: &str = text;
        return !s.trim().is_empty();
    }
    tag_name(node) == Some("img")
}

/// Document-order successor.
pub fn next_node<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    if let Some(child) = node.first_child() {
        return Some(child);
    }
    next_node_skipping_subtree(node)
}

/// Document-order successor that does not descend into `node`'s subtree.
pub fn next_node_skipping_subtree<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    let mut cur = node;
    loop {
        if let Some(sibling) = cur.next_sibling() {
            return Some(sibling);
        }
        cur = cur.parent()?;
    }
}

/// Last node of `node`'s subtree in document order (the node itself when it
/// has no children).
pub fn last_node_of_subtree<'a>(node: NodeRef<'a, Node>) -> NodeRef<'a, Node> {
    let mut cur = node;
    while let Some(last) = cur.last_child() {
        cur = last;
    }
    cur
}

/// Reverse-document-order predecessor, refusing to cross block-element
/// boundaries in either direction.
pub fn previous_in_block<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    if let Some(prev) = node.prev_sibling() {
        if is_block_element(&prev) {
            return None;
        }
        let mut cur = prev;
        while let Some(last) = cur.last_child() {
            if is_block_element(&last) {
                break;
            }
            cur = last;
        }
        return Some(cur);
    }
    let parent = node.parent()?;
    if is_block_element(&parent) || parent.parent().is_none() {
        None
    } else {
        Some(parent)
    }
}

/// First content leaf strictly after `node` in document order, skipping
/// separator subtrees and rendering-transparent nodes.
pub fn next_content_leaf_after<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    let mut cursor = next_node(node);
    while let Some(n) = cursor {
        if is_separator(&n) {
            cursor = next_node_skipping_subtree(n);
            continue;
        }
        if is_content_leaf(&n) {
            return Some(n);
        }
        cursor = next_node(n);
    }
    None
}

/// Nearest block-element ancestor (or the tree root when none exists).
pub fn block_container<'a>(node: NodeRef<'a, Node>) -> NodeRef<'a, Node> {
    let mut last = node;
    for ancestor in node.ancestors() {
        last = ancestor;
        if is_block_element(&ancestor) {
            return ancestor;
        }
    }
    last
}

pub fn is_descendant_of(node: NodeRef<'_, Node>, ancestor: NodeRef<'_, Node>) -> bool {
    node.id() == ancestor.id() || node.ancestors().any(|a| a.id() == ancestor.id())
}

/// Reply-indentation depth: the number of list-item containers (`li`, `dd`)
/// the node is nested in.
pub fn list_depth(node: &NodeRef<'_, Node>) -> usize {
    node.ancestors()
        .filter(|a| matches!(tag_name(a), Some("li") | Some("dd")))
        .count()
}
