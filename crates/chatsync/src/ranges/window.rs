//! Thread-level window maintenance
//!
//! These helpers keep a `Thread`'s `listed_ids`, `outlying_lists` and
//! `pinned_ids` consistent as history slices load, messages arrive, get
//! deleted or get their server id.

use serde::{Deserialize, Serialize};

use super::merge::{merge_id_ranges, order_history_ids, touches, union_sorted, windows_touch};
use crate::models::{MessageId, Thread};

/// Which way a history slice extends from its anchor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Backwards,
    Around,
    Forwards,
}

/// Fold a fetched history slice into the thread's windows
///
/// A slice that touches the listed window, or that is known to reach the
/// newest message, extends the listed window. Anything else becomes (or
/// joins) an outlying list. Outlying lists that end up touching the listed
/// window are absorbed into it.
///
/// Returns whether the thread changed.
pub fn add_history_slice(thread: &mut Thread, ids: &[MessageId], reached_latest: bool) -> bool {
    let mut slice = ids.to_vec();
    order_history_ids(&mut slice);
    if slice.is_empty() {
        return false;
    }

    let before_listed = thread.listed_ids.len();
    let before_outlying = thread.outlying_lists.clone();
    let before_last = thread.last_message_id;

    if reached_latest || windows_touch(&thread.listed_ids, &slice) {
        thread.listed_ids = union_sorted(&thread.listed_ids, &slice);
    } else {
        thread.outlying_lists = merge_id_ranges(&thread.outlying_lists, &slice);
    }

    absorb_outlying(thread);

    if reached_latest {
        if let Some(&newest) = thread.listed_ids.last() {
            if thread.last_message_id.is_none_or(|last| last < newest) {
                thread.last_message_id = Some(newest);
            }
        }
    }

    thread.listed_ids.len() != before_listed
        || thread.outlying_lists != before_outlying
        || thread.last_message_id != before_last
}

/// Move outlying lists that touch the listed window into it
fn absorb_outlying(thread: &mut Thread) {
    if thread.listed_ids.is_empty() {
        return;
    }

    loop {
        let position = thread
            .outlying_lists
            .iter()
            .position(|list| windows_touch(&thread.listed_ids, list));

        match position {
            Some(index) => {
                let list = thread.outlying_lists.remove(index);
                thread.listed_ids = union_sorted(&thread.listed_ids, &list);
            }
            None => break,
        }
    }
}

/// Record a newly arrived (or optimistically sent) message
///
/// When the listed window is anchored at the newest message the id extends
/// it. When the listed window is somewhere in the past, the newest end of the
/// history is unknown and the id is kept as an outlying list instead.
pub fn append_new_message(thread: &mut Thread, id: MessageId) -> bool {
    if thread.contains(id) {
        return false;
    }

    let anchored_at_newest = match (thread.listed_ids.last(), thread.last_message_id) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(&listed_last), Some(last)) => listed_last >= last || touches(&[listed_last], id),
    };

    if anchored_at_newest {
        let position = thread.listed_ids.partition_point(|&existing| existing < id);
        thread.listed_ids.insert(position, id);
    } else {
        thread.outlying_lists = merge_id_ranges(&thread.outlying_lists, &[id]);
        absorb_outlying(thread);
    }

    if thread.last_message_id.is_none_or(|last| last < id) {
        thread.last_message_id = Some(id);
    }

    true
}

/// Drop `ids` from every window of the thread
///
/// `ids` need not be sorted. Returns whether anything was removed.
pub fn remove_ids(thread: &mut Thread, ids: &[MessageId]) -> bool {
    let mut removed = ids.to_vec();
    order_history_ids(&mut removed);
    if removed.is_empty() {
        return false;
    }
    let is_removed = |id: &MessageId| removed.binary_search(id).is_ok();

    let listed_before = thread.listed_ids.len();
    thread.listed_ids.retain(|id| !is_removed(id));
    let mut changed = thread.listed_ids.len() != listed_before;

    for list in thread.outlying_lists.iter_mut() {
        let len = list.len();
        list.retain(|id| !is_removed(id));
        changed |= list.len() != len;
    }
    thread.outlying_lists.retain(|list| !list.is_empty());

    let pinned_before = thread.pinned_ids.len();
    thread.pinned_ids.retain(|id| !is_removed(id));
    changed |= thread.pinned_ids.len() != pinned_before;

    if thread.last_message_id.is_some_and(|last| is_removed(&last)) {
        thread.last_message_id = newest_known(thread);
        changed = true;
    }

    changed
}

fn newest_known(thread: &Thread) -> Option<MessageId> {
    thread
        .listed_ids
        .last()
        .copied()
        .into_iter()
        .chain(thread.outlying_lists.iter().filter_map(|list| list.last().copied()))
        .max()
}

/// Rewrite a local id to the server-assigned one, keeping windows sorted
pub fn replace_id(thread: &mut Thread, local: MessageId, server: MessageId) -> bool {
    fn rewrite(list: &mut Vec<MessageId>, local: MessageId, server: MessageId) -> bool {
        let Ok(position) = list.binary_search(&local) else {
            return false;
        };
        list.remove(position);
        if let Err(insert_at) = list.binary_search(&server) {
            list.insert(insert_at, server);
        }
        true
    }

    let mut changed = rewrite(&mut thread.listed_ids, local, server);
    for list in thread.outlying_lists.iter_mut() {
        changed |= rewrite(list, local, server);
    }
    if changed && !thread.outlying_lists.is_empty() {
        // The server id may now bridge two windows
        let lists = std::mem::take(&mut thread.outlying_lists);
        thread.outlying_lists = lists
            .into_iter()
            .fold(Vec::new(), |acc, list| merge_id_ranges(&acc, &list));
        absorb_outlying(thread);
    }

    if let Some(position) = thread.pinned_ids.iter().position(|&id| id == local) {
        thread.pinned_ids[position] = server;
        thread.pinned_ids.sort_unstable_by(|a, b| b.cmp(a));
        thread.pinned_ids.dedup();
        changed = true;
    }

    if thread.last_message_id == Some(local) {
        thread.last_message_id = Some(server);
        changed = true;
    }
    if thread.last_read_inbox_id == Some(local) {
        thread.last_read_inbox_id = Some(server);
        changed = true;
    }

    changed
}

/// The outlying list whose span covers `id`
pub fn outlying_list_by_message_id(thread: &Thread, id: MessageId) -> Option<&[MessageId]> {
    thread
        .outlying_lists
        .iter()
        .find(|list| matches!((list.first(), list.last()), (Some(&first), Some(&last)) if first <= id && id <= last))
        .map(Vec::as_slice)
}

/// The id window the UI should render
///
/// Without an anchor this is the newest `limit` listed ids. With an anchor
/// the slice is cut from whichever window spans it; an anchor outside every
/// known window yields nothing (the caller must fetch).
pub fn viewport_ids(
    thread: &Thread,
    anchor: Option<MessageId>,
    direction: Direction,
    limit: usize,
) -> Vec<MessageId> {
    if limit == 0 {
        return Vec::new();
    }

    let Some(anchor) = anchor else {
        let start = thread.listed_ids.len().saturating_sub(limit);
        return thread.listed_ids[start..].to_vec();
    };

    let listed_spans = matches!(
        (thread.listed_ids.first(), thread.listed_ids.last()),
        (Some(&first), Some(&last)) if first <= anchor && anchor <= last
    );
    let window: &[MessageId] = if listed_spans {
        &thread.listed_ids
    } else {
        match outlying_list_by_message_id(thread, anchor) {
            Some(list) => list,
            None => return Vec::new(),
        }
    };

    let index = window.partition_point(|&id| id < anchor);
    let (start, end) = match direction {
        Direction::Backwards => {
            // Include the anchor itself when it is known
            let end = if window.get(index) == Some(&anchor) { index + 1 } else { index };
            (end.saturating_sub(limit), end)
        }
        Direction::Forwards => (index, (index + limit).min(window.len())),
        Direction::Around => {
            let start = index.saturating_sub(limit / 2);
            let end = (start + limit).min(window.len());
            (end.saturating_sub(limit), end)
        }
    };

    window[start..end].to_vec()
}

/// First id after `last_read` accepted by `is_unread_candidate`
///
/// Outlying lists are consulted before the listed window, matching how a
/// deep link to the unread position is resolved.
pub fn first_id_after(
    thread: &Thread,
    last_read: Option<MessageId>,
    is_unread_candidate: impl Fn(MessageId) -> bool,
) -> Option<MessageId> {
    let after = |list: &[MessageId]| -> Option<MessageId> {
        let start = match last_read {
            Some(read) => list.partition_point(|&id| id <= read),
            None => 0,
        };
        list[start..].iter().copied().find(|&id| is_unread_candidate(id))
    };

    thread
        .outlying_lists
        .iter()
        .find_map(|list| after(list))
        .or_else(|| after(&thread.listed_ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<MessageId> {
        raw.iter().copied().map(MessageId::new).collect()
    }

    fn thread_with(listed: &[u64], outlying: &[&[u64]]) -> Thread {
        Thread {
            listed_ids: ids(listed),
            outlying_lists: outlying.iter().map(|l| ids(l)).collect(),
            last_message_id: listed.last().copied().map(MessageId::new),
            ..Thread::default()
        }
    }

    #[test]
    fn test_initial_slice_goes_to_listed() {
        let mut thread = Thread::new();
        assert!(add_history_slice(&mut thread, &ids(&[98, 99, 100]), true));
        assert_eq!(thread.listed_ids, ids(&[98, 99, 100]));
        assert_eq!(thread.last_message_id, Some(MessageId::new(100)));
    }

    #[test]
    fn test_reached_latest_alone_counts_as_change() {
        let mut thread = Thread {
            listed_ids: ids(&[50, 51, 52]),
            ..Thread::default()
        };
        assert!(add_history_slice(&mut thread, &ids(&[51, 52]), true));
        assert_eq!(thread.listed_ids, ids(&[50, 51, 52]));
        assert_eq!(thread.last_message_id, Some(MessageId::new(52)));

        assert!(!add_history_slice(&mut thread, &ids(&[51, 52]), true));
    }

    #[test]
    fn test_older_touching_slice_extends_listed() {
        let mut thread = thread_with(&[50, 51, 52], &[]);
        add_history_slice(&mut thread, &ids(&[47, 48, 49]), false);
        assert_eq!(thread.listed_ids, ids(&[47, 48, 49, 50, 51, 52]));
        assert!(thread.outlying_lists.is_empty());
    }

    #[test]
    fn test_far_slice_goes_to_outlying() {
        let mut thread = thread_with(&[50, 51, 52], &[]);
        add_history_slice(&mut thread, &ids(&[10, 11]), false);
        assert_eq!(thread.listed_ids, ids(&[50, 51, 52]));
        assert_eq!(thread.outlying_lists, vec![ids(&[10, 11])]);
    }

    #[test]
    fn test_outlying_absorbed_when_gap_closes() {
        let mut thread = thread_with(&[50, 51, 52], &[&[40, 41]]);
        add_history_slice(&mut thread, &ids(&[42, 43, 44, 45, 46, 47, 48, 49]), false);
        assert_eq!(thread.listed_ids.first(), Some(&MessageId::new(40)));
        assert_eq!(thread.listed_ids.len(), 13);
        assert!(thread.outlying_lists.is_empty());
    }

    #[test]
    fn test_repeated_slice_reports_no_change() {
        let mut thread = thread_with(&[50, 51, 52], &[&[10, 11]]);
        assert!(!add_history_slice(&mut thread, &ids(&[10, 11]), false));
        assert!(!add_history_slice(&mut thread, &ids(&[51]), false));
        assert!(!add_history_slice(&mut thread, &[], false));
    }

    #[test]
    fn test_append_new_message_extends_listed() {
        let mut thread = thread_with(&[1, 2, 3], &[]);
        assert!(append_new_message(&mut thread, MessageId::new(4)));
        assert_eq!(thread.listed_ids, ids(&[1, 2, 3, 4]));
        assert_eq!(thread.last_message_id, Some(MessageId::new(4)));
        assert!(!append_new_message(&mut thread, MessageId::new(4)));
    }

    #[test]
    fn test_append_when_listed_is_in_the_past() {
        let mut thread = thread_with(&[1, 2, 3], &[]);
        thread.last_message_id = Some(MessageId::new(90));

        append_new_message(&mut thread, MessageId::new(91));
        assert_eq!(thread.listed_ids, ids(&[1, 2, 3]));
        assert_eq!(thread.outlying_lists, vec![ids(&[91])]);
        assert_eq!(thread.last_message_id, Some(MessageId::new(91)));
    }

    #[test]
    fn test_remove_ids_everywhere() {
        let mut thread = thread_with(&[5, 6, 7], &[&[1], &[3]]);
        thread.pinned_ids = ids(&[7, 3]);

        assert!(remove_ids(&mut thread, &ids(&[7, 1])));
        assert_eq!(thread.listed_ids, ids(&[5, 6]));
        assert_eq!(thread.outlying_lists, vec![ids(&[3])]);
        assert_eq!(thread.pinned_ids, ids(&[3]));
        assert_eq!(thread.last_message_id, Some(MessageId::new(6)));

        assert!(!remove_ids(&mut thread, &ids(&[100])));
    }

    #[test]
    fn test_replace_local_id() {
        let local = MessageId::local(7, 1);
        let mut thread = thread_with(&[5, 6, 7], &[]);
        append_new_message(&mut thread, local);
        assert_eq!(thread.last_message_id, Some(local));

        assert!(replace_id(&mut thread, local, MessageId::new(8)));
        assert_eq!(thread.listed_ids, ids(&[5, 6, 7, 8]));
        assert_eq!(thread.last_message_id, Some(MessageId::new(8)));
    }

    #[test]
    fn test_replace_id_with_server_id_already_known() {
        let local = MessageId::local(7, 1);
        let mut thread = thread_with(&[5, 6, 7], &[]);
        append_new_message(&mut thread, local);
        append_new_message(&mut thread, MessageId::new(8));

        replace_id(&mut thread, local, MessageId::new(8));
        assert_eq!(thread.listed_ids, ids(&[5, 6, 7, 8]));
    }

    #[test]
    fn test_outlying_list_lookup() {
        let thread = thread_with(&[50], &[&[10, 12], &[20, 21]]);
        assert_eq!(outlying_list_by_message_id(&thread, MessageId::new(11)), Some(&ids(&[10, 12])[..]));
        assert_eq!(outlying_list_by_message_id(&thread, MessageId::new(15)), None);
    }

    #[test]
    fn test_viewport_without_anchor() {
        let thread = thread_with(&[1, 2, 3, 4, 5], &[]);
        assert_eq!(viewport_ids(&thread, None, Direction::Backwards, 3), ids(&[3, 4, 5]));
        assert_eq!(viewport_ids(&thread, None, Direction::Backwards, 10).len(), 5);
    }

    #[test]
    fn test_viewport_directions() {
        let listed: Vec<u64> = (1..=20).collect();
        let thread = thread_with(&listed, &[]);
        let anchor = Some(MessageId::new(10));

        assert_eq!(viewport_ids(&thread, anchor, Direction::Backwards, 3), ids(&[8, 9, 10]));
        assert_eq!(viewport_ids(&thread, anchor, Direction::Forwards, 3), ids(&[10, 11, 12]));
        assert_eq!(viewport_ids(&thread, anchor, Direction::Around, 4), ids(&[8, 9, 10, 11]));

        // Clamped at the window edges
        let near_start = Some(MessageId::new(2));
        assert_eq!(viewport_ids(&thread, near_start, Direction::Around, 4), ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_viewport_in_outlying_window() {
        let thread = thread_with(&[100, 101], &[&[10, 11, 12, 13]]);
        let view = viewport_ids(&thread, Some(MessageId::new(12)), Direction::Around, 2);
        assert_eq!(view, ids(&[11, 12]));
        assert!(viewport_ids(&thread, Some(MessageId::new(50)), Direction::Around, 2).is_empty());
    }

    #[test]
    fn test_first_id_after_prefers_outlying() {
        let thread = thread_with(&[50, 51, 52], &[&[10, 11, 12]]);
        let found = first_id_after(&thread, Some(MessageId::new(10)), |_| true);
        assert_eq!(found, Some(MessageId::new(11)));

        let skipping = first_id_after(&thread, Some(MessageId::new(10)), |id| id.server >= 51);
        assert_eq!(skipping, Some(MessageId::new(51)));

        assert_eq!(first_id_after(&thread, Some(MessageId::new(52)), |_| true), None);
    }
}
