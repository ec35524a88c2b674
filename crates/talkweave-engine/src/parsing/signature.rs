//! Signature detection: the backward walk from a timestamp to the nearest
//! link identifying a user.
//!
//! The walk stays inside the current block, is bounded by a fixed text
//! budget, and stops early at a caller-supplied node (the previous
//! signature's timestamp, so adjacent signatures on one line stay separate).

use crate::parsing::scan;
use crate::parsing::PageContext;
use ego_tree::{NodeId, NodeRef};
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::node::Element;
use scraper::Node;
use std::sync::LazyLock;
use talkweave_locale::LocaleConfig;

/// Loose shape check for IPv6-literal usernames, which are normalized to
/// canonical upper case.
static IPV6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{0,4}(?::[0-9A-Fa-f]{0,4}){2,7}$").unwrap());

/// The nodes spanned by a signature (nearest-first, starting at the
/// timestamp node) and the resolved author, if any.
pub struct Signature<'a> {
    pub nodes: Vec<NodeRef<'a, Node>>,
    pub author: Option<String>,
}

impl<'a> Signature<'a> {
    /// The furthest-back node of the span, i.e. where the signature starts.
    pub fn first_node(&self) -> Option<NodeRef<'a, Node>> {
        self.nodes.last().copied()
    }
}

/// Walk backward from `timestamp_node` looking for the closest user link.
///
/// The first user link fixes the expected author; later links extend the
/// span only when they resolve to the same user, so "(talk · contribs)"
/// trailers are absorbed without changing authorship. A link to a different
/// user ends the walk: that is the previous comment's signature.
pub fn find_signature<'a>(
    site: &LocaleConfig,
    ctx: &PageContext,
    timestamp_node: NodeRef<'a, Node>,
    ts_match_start: usize,
    stop_at: Option<NodeId>,
) -> Signature<'a> {
    let mut nodes = vec![timestamp_node];
    let mut author: Option<String> = None;
    let mut budget = scan::SIGNATURE_SCAN_LIMIT;

    // Text in the timestamp node ahead of the match is intervening too.
    if let Some(text) = timestamp_node.value().as_text() {
        let s: &str = text;
        let prefix = s[..ts_match_start.min(s.len())].chars().count();
        if prefix >= budget {
            return Signature {
                nodes,
                author: None,
            };
        }
        budget -= prefix;
    }

    let mut cursor = scan::previous_in_block(timestamp_node);
    while let Some(node) = cursor {
        if Some(node.id()) == stop_at {
            break;
        }
        if let Some(text) = node.value().as_text() {
            let s: &str = text;
            let chars = s.chars().count();
            if chars >= budget {
                break;
            }
            budget -= chars;
            nodes.push(node);
        } else if let Some(el) = node.value().as_element() {
            if el.name() == "a" {
                match username_from_link(el, site, ctx) {
                    Some(user) => match &author {
                        None => {
                            author = Some(user);
                            nodes.push(node);
                        }
                        Some(expected) if *expected == user => {
                            nodes.push(node);
                        }
                        Some(_) => {
                            // An adjacent signature by someone else; drop any
                            // of its content we already walked through.
                            while nodes
                                .last()
                                .is_some_and(|n| scan::is_descendant_of(*n, node))
                            {
                                nodes.pop();
                            }
                            break;
                        }
                    },
                    // Not a user link (diff links and other content links
                    // wrapping or preceding the timestamp stay in the span).
                    None => nodes.push(node),
                }
            } else {
                nodes.push(node);
            }
        } else {
            nodes.push(node);
        }
        cursor = scan::previous_in_block(node);
    }

    Signature { nodes, author }
}

/// Resolve a link to the user it identifies, when it does.
///
/// Self-links resolve to the page's own subject; links into the configured
/// user namespaces resolve to that username (subpages excluded); links into
/// the contributions special page resolve to the target username.
pub(crate) fn username_from_link(
    el: &Element,
    site: &LocaleConfig,
    ctx: &PageContext,
) -> Option<String> {
    if el.classes().any(|c| c == "mw-selflink") {
        return ctx.subject_user.clone();
    }

    let href = el.attr("href")?;
    let title = title_from_href(href, &site.article_path)?;

    if title == ctx.title {
        return ctx.subject_user.clone();
    }

    for namespace in &site.user_namespaces {
        if let Some(rest) = title.strip_prefix(namespace.as_str())
            && let Some(page) = rest.strip_prefix(':')
        {
            if page.is_empty() || page.contains('/') {
                return None;
            }
            return Some(normalize_username(page));
        }
    }

    if let Some(rest) = title.strip_prefix(&site.contributions_page)
        && let Some(user) = rest.strip_prefix('/')
        && !user.is_empty()
    {
        return Some(normalize_username(user));
    }

    None
}

/// Extract a page title from an internal href, handling both pretty paths
/// ("/wiki/User:X") and query-style links ("...?title=User:X&...").
fn title_from_href(href: &str, article_path: &str) -> Option<String> {
    let href = href.split('#').next().unwrap_or(href);

    let raw = if let Some(ix) = href.find("title=") {
        let value = &href[ix + "title=".len()..];
        value.split('&').next().unwrap_or(value)
    } else {
        let path = href.split('?').next().unwrap_or(href);
        path.strip_prefix(article_path)?
    };

    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    Some(decoded.replace('_', " "))
}

fn normalize_username(name: &str) -> String {
    let name = name.trim().replace('_', " ");
    if IPV6_RE.is_match(&name) {
        name.to_uppercase()
    } else {
        name
    }
}
