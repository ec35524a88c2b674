//! The single forward pass that discovers headings and comments.
//!
//! Emits the flat, document-order item sequence. Parent/child links are the
//! tree builder's job; identifiers are the assigner's. The walk keeps a
//! boundary cursor (the last node consumed by an item) so each comment's
//! content starts at the first interesting leaf after the previous item.

use crate::models::range::{TreePoint, TreeRange};
use crate::models::thread_item::{CommentItem, HeadingItem, ThreadItem};
use crate::parsing::signature::{self, Signature};
use crate::parsing::timestamp::{TimestampHit, TimestampRegistry};
use crate::parsing::{scan, PageContext, ParseError};
use ego_tree::NodeRef;
use scraper::{Html, Node};
use talkweave_locale::LocaleConfig;

pub(crate) fn discover(
    doc: &Html,
    site: &LocaleConfig,
    ctx: &PageContext,
    registry: &TimestampRegistry,
) -> Result<Vec<ThreadItem>, ParseError> {
    let root = doc.tree.root();
    let mut items: Vec<ThreadItem> = Vec::new();
    let mut boundary: NodeRef<'_, Node> = root;
    let mut cursor = Some(root);

    while let Some(node) = cursor {
        if scan::is_separator(&node) {
            cursor = scan::next_node_skipping_subtree(node);
            continue;
        }

        if let Some(heading_level) = scan::heading_level(&node) {
            items.push(ThreadItem::Heading(HeadingItem::new(
                scan::list_depth(&node),
                heading_inner_range(node),
                heading_level,
                heading_anchor(node),
            )));
            // Claim the whole heading subtree; section content follows it.
            boundary = scan::last_node_of_subtree(node);
            cursor = scan::next_node_skipping_subtree(node);
            continue;
        }

        if let Some(text) = node.value().as_text() {
            let s: &str = text;
            let mut search_from = 0;
            let mut comment_built = false;
            while let Some(hit) = registry.find_in(s, search_from) {
                let sig = signature::find_signature(site, ctx, node, hit.start, None);
                let Some(author) = sig.author.clone() else {
                    // A timestamp-shaped string with no user link is
                    // coincidental text, not a comment boundary.
                    log::debug!(
                        "discarding unauthenticated timestamp match: {:?}",
                        &s[hit.start..hit.end]
                    );
                    search_from = hit.end;
                    continue;
                };

                let (comment, resume) = build_comment(
                    site, ctx, registry, &mut items, boundary, node, &sig, author, &hit,
                )?;
                let end_node = doc
                    .tree
                    .get(comment.core.range.end.container)
                    .unwrap_or(node);
                items.push(ThreadItem::Comment(comment));
                boundary = end_node;
                cursor = resume;
                comment_built = true;
                break;
            }
            if !comment_built {
                cursor = scan::next_node(node);
            }
            continue;
        }

        cursor = scan::next_node(node);
    }

    Ok(items)
}

/// Assemble one comment from its first signature hit: fix the start at the
/// first interesting leaf after the boundary, then scan forward to the end
/// of the line, absorbing any further signatures found on it.
#[allow(clippy::too_many_arguments)]
fn build_comment<'a>(
    site: &LocaleConfig,
    ctx: &PageContext,
    registry: &TimestampRegistry,
    items: &mut Vec<ThreadItem>,
    boundary: NodeRef<'a, Node>,
    ts_node: NodeRef<'a, Node>,
    sig: &Signature<'a>,
    author: String,
    hit: &TimestampHit,
) -> Result<(CommentItem, Option<NodeRef<'a, Node>>), ParseError> {
    let start_leaf = scan::next_content_leaf_after(boundary).ok_or(ParseError::WalkExhausted)?;
    let start = TreePoint {
        container: start_leaf.id(),
        offset: 0,
    };

    // The very first comment on a page gets a synthetic section to live in.
    if !items.iter().any(|item| item.is_heading()) {
        items.push(ThreadItem::Heading(HeadingItem::placeholder(
            TreeRange::collapsed(start),
        )));
    }

    let mut signature_ranges = vec![signature_range(sig, ts_node, hit.start, hit.end)];
    let mut warnings: Vec<String> = Vec::new();
    if let Some(w) = &hit.warning {
        warnings.push(w.clone());
    }

    // Absorb further signatures inside the same text node (strikeouts and
    // collaborative edits rendered without an intervening element).
    let mut end_node = ts_node;
    let mut end_offset = hit.end;
    if let Some(text) = ts_node.value().as_text() {
        let s: &str = text;
        while let Some(next_hit) = registry.find_in(s, end_offset) {
            signature_ranges.push(TreeRange::new(
                TreePoint {
                    container: ts_node.id(),
                    offset: end_offset,
                },
                TreePoint {
                    container: ts_node.id(),
                    offset: next_hit.end,
                },
            ));
            end_offset = next_hit.end;
        }
    }

    // Forward scan to the end of the current paragraph/list item.
    let block = scan::block_container(ts_node);
    let mut last_ts_node = ts_node;
    let mut probe = scan::next_node(end_node);
    while let Some(n) = probe {
        if !scan::is_descendant_of(n, block)
            || scan::is_block_element(&n)
            || scan::is_separator(&n)
            || scan::tag_name(&n) == Some("br")
        {
            break;
        }
        if let Some(t) = n.value().as_text() {
            let s2: &str = t;
            let mut absorbed = false;
            if let Some(next_hit) = registry.find_in(s2, 0) {
                let next_sig =
                    signature::find_signature(site, ctx, n, next_hit.start, Some(last_ts_node.id()));
                if next_sig.author.is_some() {
                    signature_ranges.push(signature_range(&next_sig, n, next_hit.start, next_hit.end));
                    end_node = n;
                    end_offset = next_hit.end;
                    last_ts_node = n;
                    absorbed = true;
                }
            }
            if !absorbed {
                end_node = n;
                end_offset = s2.len();
            }
        } else {
            end_node = n;
            end_offset = n.children().count();
        }
        probe = scan::next_node(n);
    }

    // Indentation is read off both boundaries; when they disagree the
    // shallower one wins (inherited tie-break, see DESIGN.md).
    let start_level = 1 + scan::list_depth(&start_leaf);
    let end_level = 1 + scan::list_depth(&end_node);
    let level = if start_level != end_level {
        warnings.push("comment starts and ends with different indentation".to_string());
        start_level.min(end_level)
    } else {
        start_level
    };

    let range = TreeRange::new(
        start,
        TreePoint {
            container: end_node.id(),
            offset: end_offset,
        },
    );
    let mut comment = CommentItem::new(level, range, signature_ranges, hit.instant, author);
    comment.core.warnings = warnings;
    Ok((comment, probe))
}

/// A signature's span: from its furthest-back node to the timestamp end.
fn signature_range<'a>(
    sig: &Signature<'a>,
    ts_node: NodeRef<'a, Node>,
    ts_start: usize,
    ts_end: usize,
) -> TreeRange {
    let start = match sig.first_node() {
        Some(first) if first.id() != ts_node.id() => TreePoint {
            container: first.id(),
            offset: 0,
        },
        _ => TreePoint {
            container: ts_node.id(),
            offset: ts_start,
        },
    };
    TreeRange::new(
        start,
        TreePoint {
            container: ts_node.id(),
            offset: ts_end,
        },
    )
}

/// A heading's range spans its inner content.
fn heading_inner_range(node: NodeRef<'_, Node>) -> TreeRange {
    TreeRange::new(
        TreePoint {
            container: node.id(),
            offset: 0,
        },
        TreePoint {
            container: node.id(),
            offset: node.children().count(),
        },
    )
}

/// The anchor id the renderer attached to a heading: either on the heading
/// element itself or on an inner headline span.
fn heading_anchor(node: NodeRef<'_, Node>) -> Option<String> {
    let el = node.value().as_element()?;
    if let Some(id) = el.attr("id") {
        return Some(id.to_string());
    }
    for descendant in node.descendants() {
        if let Some(e) = descendant.value().as_element()
            && e.classes().any(|c| c == "mw-headline")
            && let Some(id) = e.attr("id")
        {
            return Some(id.to_string());
        }
    }
    None
}
