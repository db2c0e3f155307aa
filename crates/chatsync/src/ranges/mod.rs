//! Range index: which message-id windows of a thread are known locally

mod merge;
mod window;

pub use merge::{
    are_sorted_arrays_intersecting, is_strictly_ascending, merge_id_ranges, merge_listed_ids,
    merge_pinned_ids, order_history_ids, order_pinned_ids,
};
pub use window::{
    Direction, add_history_slice, append_new_message, first_id_after, outlying_list_by_message_id,
    remove_ids, replace_id, viewport_ids,
};
