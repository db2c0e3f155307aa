//! Folder aggregates: ordered chat ids and unread totals per folder

mod aggregator;
mod counters;

pub use aggregator::{FolderAggregator, OrderedIdsChange};
pub use counters::UnreadCounters;
