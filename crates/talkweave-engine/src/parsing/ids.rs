//! Final pass: assign the cross-revision `name` and page-unique `id` to
//! every item, in document order, with deterministic disambiguation.

use crate::models::thread_item::{CommentItem, ItemId, ThreadItem};
use crate::parsing::timestamp::timestamp_key;
use std::collections::HashSet;

/// Byte budget for any user-controlled text segment folded into an
/// identifier, so the full identifier fits a bounded storage column.
const ID_SEGMENT_BUDGET: usize = 80;

pub(crate) fn assign(items: &mut Vec<ThreadItem>) {
    let mut used: HashSet<String> = HashSet::new();

    for index in 0..items.len() {
        let name = compute_name(items, index);
        let id = compute_id(items, index);
        let unique = disambiguate(&mut used, id, &mut items[index]);
        let core = items[index].core_mut();
        core.name = name;
        core.id = unique;
    }
}

/// Clip a user-controlled segment to the id byte budget on a character
/// boundary.
pub(crate) fn truncate_for_id(segment: &str) -> &str {
    if segment.len() <= ID_SEGMENT_BUDGET {
        return segment;
    }
    let mut end = ID_SEGMENT_BUDGET;
    while !segment.is_char_boundary(end) {
        end -= 1;
    }
    &segment[..end]
}

fn author_key(author: &str) -> String {
    truncate_for_id(&author.replace(' ', "_")).to_string()
}

fn author_timestamp_key(comment: &CommentItem) -> String {
    format!(
        "{}-{}",
        author_key(&comment.author),
        timestamp_key(&comment.timestamp)
    )
}

/// Oldest comment (by timestamp) among an item's strict descendants.
fn oldest_comment_below(items: &[ThreadItem], index: usize) -> Option<usize> {
    let mut oldest: Option<usize> = None;
    for &ItemId(reply) in items[index].core().replies.iter() {
        for candidate in std::iter::once(reply).chain(oldest_comment_below(items, reply)) {
            if let ThreadItem::Comment(c) = &items[candidate] {
                match oldest {
                    Some(best)
                        if items[best]
                            .as_comment()
                            .is_some_and(|b| b.timestamp <= c.timestamp) => {}
                    _ => oldest = Some(candidate),
                }
            }
        }
    }
    oldest
}

fn compute_name(items: &[ThreadItem], index: usize) -> String {
    match &items[index] {
        ThreadItem::Comment(c) => format!("c-{}", author_timestamp_key(c)),
        ThreadItem::Heading(_) => match oldest_comment_below(items, index) {
            Some(oldest) => match &items[oldest] {
                ThreadItem::Comment(c) => format!("h-{}", author_timestamp_key(c)),
                ThreadItem::Heading(_) => "h-".to_string(),
            },
            None => "h-".to_string(),
        },
    }
}

fn compute_id(items: &[ThreadItem], index: usize) -> String {
    let mut id = match &items[index] {
        ThreadItem::Heading(h) if h.is_placeholder() => "h-".to_string(),
        ThreadItem::Heading(h) => {
            format!("h-{}", truncate_for_id(h.anchor.as_deref().unwrap_or("")))
        }
        ThreadItem::Comment(c) => format!("c-{}", author_timestamp_key(c)),
    };

    // Parent context disambiguates comments under generic targets.
    if let Some(ItemId(parent)) = items[index].core().parent {
        match &items[parent] {
            ThreadItem::Heading(ph) if !ph.is_placeholder() => {
                id.push('-');
                id.push_str(truncate_for_id(ph.anchor.as_deref().unwrap_or("")));
            }
            ThreadItem::Comment(pc) => {
                id.push('-');
                id.push_str(&author_timestamp_key(pc));
            }
            ThreadItem::Heading(_) => {}
        }
    }

    // Generic section titles reused across a page ("Question") stay unique
    // through the thread's oldest timestamp.
    if let ThreadItem::Heading(h) = &items[index]
        && !h.is_placeholder()
        && let Some(oldest) = oldest_comment_below(items, index)
        && let ThreadItem::Comment(c) = &items[oldest]
    {
        id.push('-');
        id.push_str(&timestamp_key(&c.timestamp));
    }

    id
}

fn disambiguate(used: &mut HashSet<String>, id: String, item: &mut ThreadItem) -> String {
    if used.insert(id.clone()) {
        return id;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{id}-{n}");
        if used.insert(candidate.clone()) {
            log::debug!("duplicate thread item id {id:?}, using {candidate:?}");
            item.core_mut().warnings.push("duplicate id".to_string());
            return candidate;
        }
        n += 1;
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

    fn comment(author: &str, hour: u32, level: usize) -> ThreadItem {
        ThreadItem::Comment(CommentItem::new(
            level,
            dummy_range(),
            vec![],
            Utc.with_ymd_and_hms(2024, 1, 5, hour, 30, 0).unwrap(),
            author.to_string(),
        ))
    }

    fn link(items: &mut [ThreadItem], parent: usize, child: usize) {
        items[parent].core_mut().replies.push(ItemId(child));
        items[child].core_mut().parent = Some(ItemId(parent));
    }

    #[test]
    fn test_names_and_ids_for_a_simple_thread() {
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::new(
                0,
                dummy_range(),
                2,
                Some("Discussion".to_string()),
            )),
            comment("Alice", 10, 1),
            comment("Bob", 11, 2),
        ];
        link(&mut items, 0, 1);
        link(&mut items, 1, 2);
        assign(&mut items);

        assert_eq!(
            items[1].id(),
            "c-Alice-2024-01-05T10:30:00.000Z-Discussion"
        );
        assert_eq!(
            items[2].id(),
            "c-Bob-2024-01-05T11:30:00.000Z-Alice-2024-01-05T10:30:00.000Z"
        );
        // Heading id and name both key off the oldest descendant comment.
        assert_eq!(items[0].id(), "h-Discussion-2024-01-05T10:30:00.000Z");
        assert_eq!(items[0].name(), "h-Alice-2024-01-05T10:30:00.000Z");
        assert_eq!(items[1].name(), "c-Alice-2024-01-05T10:30:00.000Z");
    }

    #[test]
    fn test_placeholder_heading_id_is_bare_prefix() {
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::placeholder(dummy_range())),
            comment("Alice", 10, 1),
        ];
        link(&mut items, 0, 1);
        assign(&mut items);

        assert_eq!(items[0].id(), "h-");
        // A comment under the placeholder gets no parent suffix.
        assert_eq!(items[1].id(), "c-Alice-2024-01-05T10:30:00.000Z");
    }

    #[test]
    fn test_empty_section_name_is_bare_prefix() {
        let mut items = vec![ThreadItem::Heading(HeadingItem::new(
            0,
            dummy_range(),
            2,
            Some("Quiet".to_string()),
        ))];
        assign(&mut items);
        assert_eq!(items[0].name(), "h-");
        assert_eq!(items[0].id(), "h-Quiet");
    }

    #[test]
    fn test_duplicate_ids_get_counted_suffixes() {
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::placeholder(dummy_range())),
            comment("Alice", 10, 1),
            comment("Alice", 10, 1),
            comment("Alice", 10, 1),
        ];
        link(&mut items, 0, 1);
        link(&mut items, 0, 2);
        link(&mut items, 0, 3);
        assign(&mut items);

        let base = "c-Alice-2024-01-05T10:30:00.000Z";
        assert_eq!(items[1].id(), base);
        assert_eq!(items[2].id(), format!("{base}-1"));
        assert_eq!(items[3].id(), format!("{base}-2"));
        assert!(items[1].warnings().is_empty());
        assert!(items[2].warnings().contains(&"duplicate id".to_string()));
        assert!(items[3].warnings().contains(&"duplicate id".to_string()));
    }

    #[test]
    fn test_author_segment_is_truncated() {
        let long_author = "A".repeat(300);
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::placeholder(dummy_range())),
            comment(&long_author, 10, 1),
        ];
        link(&mut items, 0, 1);
        assign(&mut items);

        let id = items[1].id();
        // "c-" + 80-byte author + "-" + timestamp.
        assert!(id.starts_with(&format!("c-{}", "A".repeat(80))));
        assert!(!id.contains(&"A".repeat(81)));
        assert_eq!(id.len(), 2 + 80 + 1 + "2024-01-05T10:30:00.000Z".len());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let s = "é".repeat(50); // 100 bytes of two-byte chars
        let clipped = truncate_for_id(&s);
        assert_eq!(clipped.len(), 80);
        assert_eq!(clipped.chars().count(), 40);

        let short = "plain";
        assert_eq!(truncate_for_id(short), "plain");
    }

    #[test]
    fn test_spaces_in_author_become_underscores() {
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::placeholder(dummy_range())),
            comment("Jane Q Public", 10, 1),
        ];
        link(&mut items, 0, 1);
        assign(&mut items);
        assert!(items[1].id().starts_with("c-Jane_Q_Public-"));
    }

    #[test]
    fn test_pre_switch_timestamps_use_legacy_key() {
        let mut items = vec![
            ThreadItem::Heading(HeadingItem::placeholder(dummy_range())),
            ThreadItem::Comment(CommentItem::new(
                1,
                dummy_range(),
                vec![],
                Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap(),
                "Alice".to_string(),
            )),
        ];
        link(&mut items, 0, 1);
        assign(&mut items);
        assert_eq!(items[1].id(), "c-Alice-20190601120000");
    }
}
