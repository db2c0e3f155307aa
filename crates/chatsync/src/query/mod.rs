//! Query API for UI consumption
//!
//! Read-only accessors over a tab's state and folder aggregates.

mod folders;
mod threads;

pub use folders::{folder_ordered_ids, folder_unread_counters};
pub use threads::{
    chat_last_message, first_unread_id, listed_ids, outlying_lists, thread_messages, viewport_ids,
};
