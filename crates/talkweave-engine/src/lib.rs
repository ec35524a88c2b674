//! Discussion-thread reconstruction for rendered talk pages.
//!
//! Given the rendered markup of a talk page, rebuild the logical structure
//! of the conversation — who said what, in reply to whom, and when — purely
//! from visual conventions: indentation, signatures, timestamps. Output
//! identifiers are deterministic and stable across revisions, so parsing is
//! idempotent for an unchanged tree.

pub mod models;
pub mod parsing;

// Re-export key types for easier usage
pub use models::{
    CommentItem, HeadingItem, ItemId, ItemRecord, RecordError, ThreadItem, ThreadItemSet,
    TreePoint, TreeRange,
};
pub use parsing::{PageContext, ParseError, ThreadParser};
