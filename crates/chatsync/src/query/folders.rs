//! Folder reads

use crate::folders::{FolderAggregator, UnreadCounters};
use crate::models::{ChatId, FolderId};

/// Chat ids of a folder in display order (pinned first, then by activity)
pub fn folder_ordered_ids(folders: &FolderAggregator, folder_id: FolderId) -> Vec<ChatId> {
    folders.ordered_ids(folder_id)
}

pub fn folder_unread_counters(folders: &FolderAggregator, folder_id: FolderId) -> UnreadCounters {
    folders.unread_counters(folder_id)
}
