//! Flat serialized form of thread items.
//!
//! Records let a previously computed [`ThreadItemSet`] be reconstructed
//! against a freshly rendered tree without re-running discovery (cache-warm
//! paths). Node addresses are stored as root-relative child-index paths;
//! timestamps are stored in whichever canonical encoding was current when
//! the item was serialized, and both encodings are accepted on input.

use crate::models::range::{NodePath, TreePoint, TreeRange};
use crate::models::thread_item::{
    CommentItem, HeadingItem, ThreadItem, MAX_REAL_HEADING_LEVEL, PLACEHOLDER_HEADING_LEVEL,
};
use crate::models::thread_item_set::ThreadItemSet;
use crate::parsing::builder;
use crate::parsing::timestamp::{parse_timestamp_key, timestamp_key};
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unrecognized thread item type '{0}'")]
    UnknownItemType(String),

    #[error("record '{id}' is missing required field '{field}'")]
    MissingField { id: String, field: &'static str },

    #[error("record '{id}' has unparsable timestamp '{value}'")]
    InvalidTimestamp { id: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeRecord {
    pub start: NodePath,
    pub start_offset: usize,
    pub end: NodePath,
    pub end_offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: usize,
    pub range: RangeRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature_ranges: Vec<RangeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

const KIND_HEADING: &str = "heading";
const KIND_COMMENT: &str = "comment";

fn range_record(range: &TreeRange, doc: &Html) -> RangeRecord {
    let path_of = |point: &TreePoint| {
        doc.tree
            .get(point.container)
            .map(NodePath::of)
            .unwrap_or(NodePath(Vec::new()))
    };
    RangeRecord {
        start: path_of(&range.start),
        start_offset: range.start.offset,
        end: path_of(&range.end),
        end_offset: range.end.offset,
    }
}

/// Resolve a stored range against a freshly rendered tree. Falls back to a
/// collapsed range at the root when the address no longer resolves; the
/// caller records a warning instead of failing.
fn resolve_range(record: &RangeRecord, doc: &Html) -> Option<TreeRange> {
    let start = record.start.resolve(doc)?;
    let end = record.end.resolve(doc)?;
    Some(TreeRange::new(
        TreePoint {
            container: start,
            offset: record.start_offset,
        },
        TreePoint {
            container: end,
            offset: record.end_offset,
        },
    ))
}

impl ThreadItemSet {
    /// Flatten the set for persistence, addressing nodes by tree path.
    pub fn to_records(&self, doc: &Html) -> Vec<ItemRecord> {
        self.items()
            .iter()
            .map(|item| match item {
                ThreadItem::Heading(h) => ItemRecord {
                    kind: KIND_HEADING.to_string(),
                    level: h.core.level,
                    range: range_record(&h.core.range, doc),
                    signature_ranges: Vec::new(),
                    timestamp: None,
                    author: None,
                    name: h.core.name.clone(),
                    id: h.core.id.clone(),
                    heading_level: Some(h.heading_level),
                    anchor: h.anchor.clone(),
                },
                ThreadItem::Comment(c) => ItemRecord {
                    kind: KIND_COMMENT.to_string(),
                    level: c.core.level,
                    range: range_record(&c.core.range, doc),
                    signature_ranges: c
                        .signature_ranges
                        .iter()
                        .map(|r| range_record(r, doc))
                        .collect(),
                    timestamp: Some(timestamp_key(&c.timestamp)),
                    author: Some(c.author.clone()),
                    name: c.core.name.clone(),
                    id: c.core.id.clone(),
                    heading_level: None,
                    anchor: None,
                },
            })
            .collect()
    }

    /// Rebuild a set from records against a freshly rendered tree.
    ///
    /// Parent/child links are reconstructed by re-running the tree builder
    /// over the flat sequence; ids and names are taken from the records
    /// verbatim. The only fatal condition is an unrecognized item type.
    pub fn from_records(records: Vec<ItemRecord>, doc: &Html) -> Result<Self, RecordError> {
        let root_point = TreePoint {
            container: doc.tree.root().id(),
            offset: 0,
        };

        let mut items: Vec<ThreadItem> = Vec::with_capacity(records.len());
        for record in records {
            let mut warnings = Vec::new();
            let range = match resolve_range(&record.range, doc) {
                Some(range) => range,
                None => {
                    warnings.push("stored range no longer resolves".to_string());
                    TreeRange::collapsed(root_point)
                }
            };

            let mut item = match record.kind.as_str() {
                KIND_HEADING => {
                    // Any sentinel above the real range marks a placeholder,
                    // including the legacy value older records carry.
                    let heading_level = record
                        .heading_level
                        .map(|level| {
                            if level > MAX_REAL_HEADING_LEVEL {
                                PLACEHOLDER_HEADING_LEVEL
                            } else {
                                level
                            }
                        })
                        .unwrap_or(PLACEHOLDER_HEADING_LEVEL);
                    ThreadItem::Heading(HeadingItem::new(
                        record.level,
                        range,
                        heading_level,
                        record.anchor.clone(),
                    ))
                }
                KIND_COMMENT => {
                    let author =
                        record.author.clone().ok_or_else(|| RecordError::MissingField {
                            id: record.id.clone(),
                            field: "author",
                        })?;
                    let raw_timestamp =
                        record
                            .timestamp
                            .clone()
                            .ok_or_else(|| RecordError::MissingField {
                                id: record.id.clone(),
                                field: "timestamp",
                            })?;
                    let timestamp = parse_timestamp_key(&raw_timestamp).ok_or_else(|| {
                        RecordError::InvalidTimestamp {
                            id: record.id.clone(),
                            value: raw_timestamp,
                        }
                    })?;
                    let mut signature_ranges = Vec::new();
                    for stored in &record.signature_ranges {
                        match resolve_range(stored, doc) {
                            Some(range) => signature_ranges.push(range),
                            None => warnings
                                .push("stored signature range no longer resolves".to_string()),
                        }
                    }
                    ThreadItem::Comment(CommentItem::new(
                        record.level,
                        range,
                        signature_ranges,
                        timestamp,
                        author,
                    ))
                }
                other => return Err(RecordError::UnknownItemType(other.to_string())),
            };

            let core = item.core_mut();
            core.name = record.name;
            core.id = record.id;
            core.warnings = warnings;
            items.push(item);
        }

        let threads = builder::build_tree(&mut items);
        Ok(ThreadItemSet::index(items, threads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_records() -> Vec<ItemRecord> {
        vec![
            ItemRecord {
                kind: "heading".to_string(),
                level: 0,
                range: RangeRecord {
                    start: NodePath(vec![]),
                    start_offset: 0,
                    end: NodePath(vec![]),
                    end_offset: 0,
                },
                signature_ranges: Vec::new(),
                timestamp: None,
                author: None,
                name: "h-Alice-2024-01-05T10:30:00.000Z".to_string(),
                id: "h-Topic-2024-01-05T10:30:00.000Z".to_string(),
                heading_level: Some(2),
                anchor: Some("Topic".to_string()),
            },
            ItemRecord {
                kind: "comment".to_string(),
                level: 1,
                range: RangeRecord {
                    start: NodePath(vec![]),
                    start_offset: 0,
                    end: NodePath(vec![]),
                    end_offset: 0,
                },
                signature_ranges: Vec::new(),
                timestamp: Some("2024-01-05T10:30:00.000Z".to_string()),
                author: Some("Alice".to_string()),
                name: "c-Alice-2024-01-05T10:30:00.000Z".to_string(),
                id: "c-Alice-2024-01-05T10:30:00.000Z-Topic".to_string(),
                heading_level: None,
                anchor: None,
            },
        ]
    }

    #[test]
    fn test_from_records_rebuilds_links() {
        let doc = Html::parse_document("<p>x</p>");
        let set = ThreadItemSet::from_records(sample_records(), &doc).unwrap();

        assert_eq!(set.len(), 2);
        let heading = set.find_by_id("h-Topic-2024-01-05T10:30:00.000Z").unwrap();
        assert_eq!(heading.replies().len(), 1);
        let comment = set
            .find_by_id("c-Alice-2024-01-05T10:30:00.000Z-Topic")
            .unwrap();
        assert_eq!(comment.as_comment().unwrap().author, "Alice");
        assert_eq!(comment.parent(), Some(crate::models::ItemId(0)));
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let mut records = sample_records();
        records[0].kind = "bogus".to_string();
        let doc = Html::parse_document("<p>x</p>");
        let err = ThreadItemSet::from_records(records, &doc).unwrap_err();
        assert!(matches!(err, RecordError::UnknownItemType(t) if t == "bogus"));
    }

    #[test]
    fn test_legacy_placeholder_sentinel_is_accepted() {
        let mut records = sample_records();
        records[0].heading_level = Some(7);
        records[0].anchor = None;
        let doc = Html::parse_document("<p>x</p>");
        let set = ThreadItemSet::from_records(records, &doc).unwrap();
        let heading = set.items()[0].as_heading().unwrap();
        assert!(heading.is_placeholder());
        assert_eq!(heading.heading_level, PLACEHOLDER_HEADING_LEVEL);
    }

    #[test]
    fn test_both_timestamp_encodings_are_accepted() {
        let mut records = sample_records();
        records[1].timestamp = Some("20240105103000".to_string());
        let doc = Html::parse_document("<p>x</p>");
        let set = ThreadItemSet::from_records(records, &doc).unwrap();
        let comment = set.items()[1].as_comment().unwrap();
        assert_eq!(timestamp_key(&comment.timestamp), "2024-01-05T10:30:00.000Z");
    }

    #[test]
    fn test_invalid_timestamp_is_reported() {
        let mut records = sample_records();
        records[1].timestamp = Some("whenever".to_string());
        let doc = Html::parse_document("<p>x</p>");
        let err = ThreadItemSet::from_records(records, &doc).unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_unresolvable_range_degrades_to_warning() {
        let mut records = sample_records();
        records[1].range.start = NodePath(vec![42, 42]);
        records[1].range.end = NodePath(vec![42, 42]);
        let doc = Html::parse_document("<p>x</p>");
        let set = ThreadItemSet::from_records(records, &doc).unwrap();
        assert!(set.items()[1]
            .warnings()
            .iter()
            .any(|w| w.contains("no longer resolves")));
    }

    #[test]
    fn test_record_json_shape() {
        let records = sample_records();
        let json = serde_json::to_string(&records).unwrap();
        // Empty optionals are omitted from the flat record.
        assert!(json.contains(r#""type":"heading""#));
        assert!(!json.contains(r#""timestamp":null"#));
        let back: Vec<ItemRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].author.as_deref(), Some("Alice"));
    }
}
