//! The container indexing a parsed page's thread items.

use crate::models::thread_item::{CommentItem, ItemId, ThreadItem, ThreadSummary};
use std::collections::HashMap;

/// Ordered thread items plus id/name lookup indexes.
///
/// Owns the item arena. Built in one shot by the parser (or reconstructed
/// from serialized records); immutable afterwards except for memoized
/// aggregate caches. Re-parsing replaces the whole set.
#[derive(Debug, Default)]
pub struct ThreadItemSet {
    items: Vec<ThreadItem>,
    by_id: HashMap<String, ItemId>,
    by_name: HashMap<String, Vec<ItemId>>,
    threads: Vec<ItemId>,
}

impl ThreadItemSet {
    /// Index finalized items (ids and names already assigned).
    pub(crate) fn index(items: Vec<ThreadItem>, threads: Vec<ItemId>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name: HashMap<String, Vec<ItemId>> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            by_id.insert(item.id().to_string(), ItemId(i));
            by_name
                .entry(item.name().to_string())
                .or_default()
                .push(ItemId(i));
        }
        ThreadItemSet {
            items,
            by_id,
            by_name,
            threads,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All items in document order.
    pub fn items(&self) -> &[ThreadItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&ThreadItem> {
        self.items.get(id.0)
    }

    /// Roots of the thread forest: top-level headings plus any items that
    /// could not be connected to a thread.
    pub fn threads(&self) -> &[ItemId] {
        &self.threads
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ThreadItem> {
        self.by_id.get(id).and_then(|i| self.get(*i))
    }

    /// Names are not unique; all carriers are returned in document order.
    pub fn find_by_name(&self, name: &str) -> Vec<&ThreadItem> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|i| self.get(*i)).collect())
            .unwrap_or_default()
    }

    /// Memoized aggregates over the item's reply subtree.
    pub fn summary(&self, id: ItemId) -> &ThreadSummary {
        self.items[id.0]
            .summary_cell()
            .get_or_init(|| self.compute_summary(id))
    }

    pub fn comment_count_below(&self, id: ItemId) -> usize {
        self.summary(id).comment_count
    }

    pub fn authors_below(&self, id: ItemId) -> &[String] {
        &self.summary(id).authors
    }

    pub fn oldest_comment_below(&self, id: ItemId) -> Option<&CommentItem> {
        self.summary(id)
            .oldest
            .and_then(|i| self.get(i))
            .and_then(|item| item.as_comment())
    }

    pub fn latest_comment_below(&self, id: ItemId) -> Option<&CommentItem> {
        self.summary(id)
            .latest
            .and_then(|i| self.get(i))
            .and_then(|item| item.as_comment())
    }

    fn compute_summary(&self, id: ItemId) -> ThreadSummary {
        let mut summary = ThreadSummary::default();
        for &reply in self.items[id.0].core().replies.iter() {
            let sub = self.summary(reply);
            summary.comment_count += sub.comment_count;
            summary.authors.extend(sub.authors.iter().cloned());
            summary.oldest = older_of(self, summary.oldest, sub.oldest);
            summary.latest = later_of(self, summary.latest, sub.latest);
            if let ThreadItem::Comment(c) = &self.items[reply.0] {
                summary.comment_count += 1;
                summary.authors.push(c.author.clone());
                summary.oldest = older_of(self, summary.oldest, Some(reply));
                summary.latest = later_of(self, summary.latest, Some(reply));
            }
        }
        summary.authors.sort();
        summary.authors.dedup();
        summary
    }
}

fn timestamp_of(set: &ThreadItemSet, id: ItemId) -> Option<chrono::DateTime<chrono::Utc>> {
    set.get(id).and_then(|i| i.as_comment()).map(|c| c.timestamp)
}

fn older_of(set: &ThreadItemSet, a: Option<ItemId>, b: Option<ItemId>) -> Option<ItemId> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if timestamp_of(set, b) < timestamp_of(set, a) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (a, b) => a.or(b),
    }
}

fn later_of(set: &ThreadItemSet, a: Option<ItemId>, b: Option<ItemId>) -> Option<ItemId> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if timestamp_of(set, b) > timestamp_of(set, a) {
                Some(b)
            } else {
                Some(a)
            }
        }
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::range::{TreePoint, TreeRange};
    use crate::models::thread_item::{CommentItem, HeadingItem};
    use chrono::{TimeZone, Utc};
    use ego_tree::Tree;
    use pretty_assertions::assert_eq;
    use scraper::Node;

    fn dummy_range() -> TreeRange {
        let tree: Tree<Node> = Tree::new(Node::Fragment);
        TreeRange::collapsed(TreePoint {
            container: tree.root().id(),
            offset: 0,
        })
    }

    fn comment(author: &str, hour: u32) -> ThreadItem {
        ThreadItem::Comment(CommentItem::new(
            1,
            dummy_range(),
            vec![dummy_range()],
            Utc.with_ymd_and_hms(2024, 1, 5, hour, 0, 0).unwrap(),
            author.to_string(),
        ))
    }

    fn linked_set() -> ThreadItemSet {
        // heading -> alice -> bob, carol
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::new(0, dummy_range(), 2, None)),
            comment("Alice", 10),
            comment("Bob", 12),
            comment("Carol", 11),
        ];
        items[0].core_mut().id = "h-Topic".to_string();
        items[0].core_mut().name = "h-Alice-x".to_string();
        items[0].core_mut().replies = vec![ItemId(1)];
        items[1].core_mut().id = "c-Alice-x".to_string();
        items[1].core_mut().name = "c-Alice-x".to_string();
        items[1].core_mut().parent = Some(ItemId(0));
        items[1].core_mut().replies = vec![ItemId(2), ItemId(3)];
        items[2].core_mut().id = "c-Bob-x".to_string();
        items[2].core_mut().name = "c-Bob-x".to_string();
        items[2].core_mut().parent = Some(ItemId(1));
        items[3].core_mut().id = "c-Carol-x".to_string();
        items[3].core_mut().name = "c-Bob-x".to_string(); // name collision on purpose
        items[3].core_mut().parent = Some(ItemId(1));
        ThreadItemSet::index(items, vec![ItemId(0)])
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let set = linked_set();
        assert_eq!(set.len(), 4);
        assert!(set.find_by_id("c-Alice-x").is_some());
        assert!(set.find_by_id("c-Nobody").is_none());
        // Names are a multimap.
        assert_eq!(set.find_by_name("c-Bob-x").len(), 2);
        assert_eq!(set.find_by_name("c-Alice-x").len(), 1);
    }

    #[test]
    fn test_summary_counts_descendants() {
        let set = linked_set();
        assert_eq!(set.comment_count_below(ItemId(0)), 3);
        assert_eq!(set.comment_count_below(ItemId(1)), 2);
        assert_eq!(set.comment_count_below(ItemId(2)), 0);
        assert_eq!(
            set.authors_below(ItemId(0)),
            &["Alice".to_string(), "Bob".to_string(), "Carol".to_string()]
        );
    }

    #[test]
    fn test_oldest_and_latest_below() {
        let set = linked_set();
        assert_eq!(set.oldest_comment_below(ItemId(0)).unwrap().author, "Alice");
        assert_eq!(set.latest_comment_below(ItemId(0)).unwrap().author, "Bob");
        // Below Alice: Bob (12:00) and Carol (11:00).
        assert_eq!(set.oldest_comment_below(ItemId(1)).unwrap().author, "Carol");
        assert_eq!(set.latest_comment_below(ItemId(1)).unwrap().author, "Bob");
    }

    #[test]
    fn test_summary_is_memoized() {
        let set = linked_set();
        let first = set.summary(ItemId(0)) as *const _;
        let second = set.summary(ItemId(0)) as *const _;
        assert_eq!(first, second);
    }
}
