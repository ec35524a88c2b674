//! Thread items: the headings and comments discovered on a talk page.
//!
//! `ThreadItem` is a closed sum type over a shared [`ItemCore`]. Items live
//! in the arena owned by [`crate::models::ThreadItemSet`]; `replies` holds
//! owning child indexes and `parent` is the non-owning back-reference.

use crate::models::range::TreeRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

/// Index of an item within its [`crate::models::ThreadItemSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub usize);

/// Sentinel `heading_level` for placeholder headings; greater than any real
/// heading level.
pub const PLACEHOLDER_HEADING_LEVEL: u8 = 99;

/// Older serialized records used this placeholder sentinel instead.
pub const LEGACY_PLACEHOLDER_HEADING_LEVEL: u8 = 7;

pub const MAX_REAL_HEADING_LEVEL: u8 = 6;

/// Fields shared by both item variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCore {
    /// Indentation depth: 0 for top-level headings, 1+ for comments.
    pub level: usize,
    /// Span of the item's content in the rendered tree, resolved lazily.
    pub range: TreeRange,
    /// Cross-revision identifier; coarse and collision-tolerant.
    pub name: String,
    /// Page-unique identifier; disambiguated within the current document.
    pub id: String,
    /// Owning child indexes, in document order.
    pub replies: Vec<ItemId>,
    /// Non-owning back-reference to the single owner.
    pub parent: Option<ItemId>,
    /// Append-only recoverable anomaly notes.
    pub warnings: Vec<String>,
}

impl ItemCore {
    pub fn new(level: usize, range: TreeRange) -> Self {
        ItemCore {
            level,
            range,
            name: String::new(),
            id: String::new(),
            replies: Vec::new(),
            parent: None,
            warnings: Vec::new(),
        }
    }
}

/// Aggregates over an item's subtree of replies, computed by one memoized
/// recursive fold and invalidated only by a full rebuild.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThreadSummary {
    /// Number of comments among strict descendants.
    pub comment_count: usize,
    /// Sorted, de-duplicated authors among strict descendants.
    pub authors: Vec<String>,
    /// Oldest descendant comment by timestamp.
    pub oldest: Option<ItemId>,
    /// Latest descendant comment by timestamp.
    pub latest: Option<ItemId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingItem {
    pub core: ItemCore,
    /// 1..=6 for rendered headings; [`PLACEHOLDER_HEADING_LEVEL`] for the
    /// synthetic section before the first real heading.
    pub heading_level: u8,
    /// Anchor id attribute carried by the rendered heading, when present.
    pub anchor: Option<String>,
    pub(crate) summary: OnceCell<ThreadSummary>,
}

impl HeadingItem {
    pub fn new(level: usize, range: TreeRange, heading_level: u8, anchor: Option<String>) -> Self {
        HeadingItem {
            core: ItemCore::new(level, range),
            heading_level,
            anchor,
            summary: OnceCell::new(),
        }
    }

    /// The synthetic heading for comments preceding the first real heading.
    pub fn placeholder(range: TreeRange) -> Self {
        HeadingItem::new(0, range, PLACEHOLDER_HEADING_LEVEL, None)
    }

    pub fn is_placeholder(&self) -> bool {
        self.heading_level > MAX_REAL_HEADING_LEVEL
    }

    /// Only non-placeholder level-2 sections with at least one comment can
    /// be subscribed to; an empty section shares the empty-suffix name with
    /// every other empty section.
    pub fn is_subscribable(&self) -> bool {
        !self.is_placeholder() && self.heading_level == 2 && self.core.name != "h-"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentItem {
    pub core: ItemCore,
    /// One span per signature; several when multiple users signed the same
    /// line.
    pub signature_ranges: Vec<TreeRange>,
    /// Normalized instant of the first signature.
    pub timestamp: DateTime<Utc>,
    /// Username resolved from the first signature.
    pub author: String,
    pub(crate) summary: OnceCell<ThreadSummary>,
}

impl CommentItem {
    pub fn new(
        level: usize,
        range: TreeRange,
        signature_ranges: Vec<TreeRange>,
        timestamp: DateTime<Utc>,
        author: String,
    ) -> Self {
        CommentItem {
            core: ItemCore::new(level, range),
            signature_ranges,
            timestamp,
            author,
            summary: OnceCell::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadItem {
    Heading(HeadingItem),
    Comment(CommentItem),
}

impl ThreadItem {
    pub fn core(&self) -> &ItemCore {
        match self {
            ThreadItem::Heading(h) => &h.core,
            ThreadItem::Comment(c) => &c.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut ItemCore {
        match self {
            ThreadItem::Heading(h) => &mut h.core,
            ThreadItem::Comment(c) => &mut c.core,
        }
    }

    pub fn level(&self) -> usize {
        self.core().level
    }

    pub fn id(&self) -> &str {
        &self.core().id
    }

    pub fn name(&self) -> &str {
        &self.core().name
    }

    pub fn range(&self) -> &TreeRange {
        &self.core().range
    }

    pub fn replies(&self) -> &[ItemId] {
        &self.core().replies
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.core().parent
    }

    pub fn warnings(&self) -> &[String] {
        &self.core().warnings
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, ThreadItem::Comment(_))
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, ThreadItem::Heading(_))
    }

    pub fn as_comment(&self) -> Option<&CommentItem> {
        match self {
            ThreadItem::Comment(c) => Some(c),
            ThreadItem::Heading(_) => None,
        }
    }

    pub fn as_heading(&self) -> Option<&HeadingItem> {
        match self {
            ThreadItem::Heading(h) => Some(h),
            ThreadItem::Comment(_) => None,
        }
    }

    pub(crate) fn summary_cell(&self) -> &OnceCell<ThreadSummary> {
        match self {
            ThreadItem::Heading(h) => &h.summary,
            ThreadItem::Comment(c) => &c.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::range::TreePoint;
    use ego_tree::Tree;
    use scraper::Node;

    fn dummy_range() -> TreeRange {
        // A throwaway tree just to mint a NodeId for unit tests.
        let tree: Tree<Node> = Tree::new(Node::Fragment);
        TreeRange::collapsed(TreePoint {
            container: tree.root().id(),
            offset: 0,
        })
    }

    #[test]
    fn test_placeholder_heading() {
        let heading = HeadingItem::placeholder(dummy_range());
        assert!(heading.is_placeholder());
        assert!(!heading.is_subscribable());
        assert_eq!(heading.core.level, 0);
    }

    #[test]
    fn test_legacy_sentinel_also_counts_as_placeholder() {
        let heading = HeadingItem::new(
            0,
            dummy_range(),
            LEGACY_PLACEHOLDER_HEADING_LEVEL,
            None,
        );
        assert!(heading.is_placeholder());
    }

    #[test]
    fn test_subscribable_requires_level_two_and_nonempty_name() {
        let mut heading = HeadingItem::new(0, dummy_range(), 2, Some("Topic".to_string()));
        heading.core.name = "h-Alice-2024-01-05T10:30:00.000Z".to_string();
        assert!(heading.is_subscribable());

        heading.core.name = "h-".to_string();
        assert!(!heading.is_subscribable());

        let mut level3 = HeadingItem::new(0, dummy_range(), 3, None);
        level3.core.name = "h-Alice-2024-01-05T10:30:00.000Z".to_string();
        assert!(!level3.is_subscribable());
    }
}
