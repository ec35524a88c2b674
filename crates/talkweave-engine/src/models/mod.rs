pub mod range;
pub mod record;
pub mod thread_item;
pub mod thread_item_set;

pub use range::{NodePath, TreePoint, TreeRange};
pub use record::{ItemRecord, RangeRecord, RecordError};
pub use thread_item::{
    CommentItem, HeadingItem, ItemCore, ItemId, ThreadItem, ThreadSummary,
    LEGACY_PLACEHOLDER_HEADING_LEVEL, MAX_REAL_HEADING_LEVEL, PLACEHOLDER_HEADING_LEVEL,
};
pub use thread_item_set::ThreadItemSet;
