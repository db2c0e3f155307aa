//! Merging of sorted message-id windows
//!
//! All functions here are pure: they take sorted id arrays and return new
//! ones. Callers keep the results on `Thread`.

use log::warn;

use crate::models::MessageId;

/// Two-pointer intersection test over two ascending arrays
pub fn are_sorted_arrays_intersecting(a: &[MessageId], b: &[MessageId]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Whether `ids` is sorted ascending without duplicates
pub fn is_strictly_ascending(ids: &[MessageId]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}

/// Sort history ids ascending and drop duplicates
pub fn order_history_ids(ids: &mut Vec<MessageId>) {
    ids.sort_unstable();
    ids.dedup();
}

/// Sort pinned ids in display order (higher id first) and drop duplicates
pub fn order_pinned_ids(ids: &mut Vec<MessageId>) {
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
}

/// Union of two ascending, duplicate-free arrays
pub(crate) fn union_sorted(a: &[MessageId], b: &[MessageId]) -> Vec<MessageId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Whether a window starting at `next_first` touches or overlaps `prev`
///
/// `prev` must be non-empty and sorted ascending, and must not start after
/// `next_first`.
pub(crate) fn touches(prev: &[MessageId], next_first: MessageId) -> bool {
    prev.last()
        .is_some_and(|last| next_first <= last.successor())
}

/// Whether two sorted windows touch or overlap, in either order
pub(crate) fn windows_touch(a: &[MessageId], b: &[MessageId]) -> bool {
    match (a.first(), b.first()) {
        (Some(a_first), Some(b_first)) if a_first <= b_first => touches(a, *b_first),
        (Some(a_first), Some(_)) => touches(b, *a_first),
        _ => false,
    }
}

/// Fold a freshly fetched id window into a set of outlying windows
///
/// The first existing window that shares an id with `ids_update` absorbs it
/// (only one per call). Otherwise the update is appended as a new window.
/// Windows are then sorted by their first id and touching windows are
/// coalesced, so the result is pairwise disjoint and non-adjacent.
///
/// An empty or unsorted update is ignored and `ranges` is returned as is.
pub fn merge_id_ranges(ranges: &[Vec<MessageId>], ids_update: &[MessageId]) -> Vec<Vec<MessageId>> {
    if ids_update.is_empty() {
        warn!("Ignoring empty id range update");
        return ranges.to_vec();
    }
    if !is_strictly_ascending(ids_update) {
        warn!(
            "Ignoring malformed id range update of {} ids (not strictly ascending)",
            ids_update.len()
        );
        return ranges.to_vec();
    }

    let mut has_intersection = false;
    let mut lists: Vec<Vec<MessageId>> = ranges
        .iter()
        .filter(|list| !list.is_empty())
        .map(|list| {
            if !has_intersection && are_sorted_arrays_intersecting(list, ids_update) {
                has_intersection = true;
                union_sorted(list, ids_update)
            } else {
                list.clone()
            }
        })
        .collect();

    if !has_intersection {
        lists.push(ids_update.to_vec());
    }

    lists.sort_by(|a, b| a[0].cmp(&b[0]));

    let mut coalesced: Vec<Vec<MessageId>> = Vec::with_capacity(lists.len());
    for list in lists {
        match coalesced.last_mut() {
            Some(prev) if touches(prev, list[0]) => *prev = union_sorted(prev, &list),
            _ => coalesced.push(list),
        }
    }

    coalesced
}

/// Merge ids into the canonical listed window (ascending)
pub fn merge_listed_ids(listed: &[MessageId], ids: &[MessageId]) -> Vec<MessageId> {
    let mut update = ids.to_vec();
    order_history_ids(&mut update);
    union_sorted(listed, &update)
}

/// Merge ids into a pinned list (descending, higher id first)
pub fn merge_pinned_ids(pinned: &[MessageId], ids: &[MessageId]) -> Vec<MessageId> {
    let mut merged: Vec<MessageId> = pinned.iter().chain(ids.iter()).copied().collect();
    order_pinned_ids(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn ids(raw: &[u64]) -> Vec<MessageId> {
        raw.iter().copied().map(MessageId::new).collect()
    }

    fn lists(raw: &[&[u64]]) -> Vec<Vec<MessageId>> {
        raw.iter().map(|l| ids(l)).collect()
    }

    fn assert_disjoint(ranges: &[Vec<MessageId>]) {
        for list in ranges {
            assert!(!list.is_empty());
            assert!(is_strictly_ascending(list), "unsorted list {:?}", list);
        }
        for pair in ranges.windows(2) {
            let prev_last = *pair[0].last().unwrap();
            let next_first = pair[1][0];
            assert!(
                next_first > prev_last.successor(),
                "lists touch or overlap: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_merge_into_empty_index() {
        let result = merge_id_ranges(&[], &ids(&[10, 11, 12]));
        assert_eq!(result, lists(&[&[10, 11, 12]]));
    }

    #[test]
    fn test_adjacent_merge() {
        let result = merge_id_ranges(&lists(&[&[1, 2, 3]]), &ids(&[4, 5]));
        assert_eq!(result, lists(&[&[1, 2, 3, 4, 5]]));
    }

    #[test]
    fn test_disjoint_stays_disjoint() {
        let result = merge_id_ranges(&lists(&[&[1, 2, 3]]), &ids(&[10, 11]));
        assert_eq!(result, lists(&[&[1, 2, 3], &[10, 11]]));
    }

    #[test]
    fn test_overlapping_update_extends_list() {
        let result = merge_id_ranges(&lists(&[&[5, 6, 7]]), &ids(&[6, 7, 8, 9]));
        assert_eq!(result, lists(&[&[5, 6, 7, 8, 9]]));
    }

    #[test]
    fn test_update_bridging_two_lists() {
        // Intersects the first list only; the coalescing pass joins the second
        let result = merge_id_ranges(&lists(&[&[1, 2, 3], &[8, 9]]), &ids(&[3, 4, 5, 6, 7]));
        assert_eq!(result, lists(&[&[1, 2, 3, 4, 5, 6, 7, 8, 9]]));
    }

    #[test]
    fn test_update_intersecting_two_lists_first_match_wins() {
        let result = merge_id_ranges(&lists(&[&[1, 2, 3], &[5, 6]]), &ids(&[3, 4, 5]));
        assert_eq!(result, lists(&[&[1, 2, 3, 4, 5, 6]]));
    }

    #[test]
    fn test_sparse_windows_interleaving_are_coalesced() {
        let result = merge_id_ranges(&lists(&[&[1, 4, 6], &[9, 12]]), &ids(&[3, 6, 12]));
        assert_eq!(result, lists(&[&[1, 3, 4, 6, 9, 12]]));
        assert_disjoint(&result);
    }

    #[test]
    fn test_unsorted_input_lists_are_sorted_by_first_id() {
        let result = merge_id_ranges(&lists(&[&[20, 21], &[1, 2]]), &ids(&[10]));
        assert_eq!(result, lists(&[&[1, 2], &[10], &[20, 21]]));
    }

    #[test]
    fn test_empty_update_is_noop() {
        let ranges = lists(&[&[1, 2]]);
        assert_eq!(merge_id_ranges(&ranges, &[]), ranges);
    }

    #[test]
    fn test_malformed_update_is_noop() {
        let ranges = lists(&[&[1, 2]]);
        assert_eq!(merge_id_ranges(&ranges, &ids(&[5, 4])), ranges);
        assert_eq!(merge_id_ranges(&ranges, &ids(&[5, 5])), ranges);
    }

    #[test]
    fn test_idempotent() {
        let ranges = lists(&[&[1, 2, 3], &[10, 11], &[30]]);
        let update = ids(&[11, 12, 13, 20]);

        let once = merge_id_ranges(&ranges, &update);
        let twice = merge_id_ranges(&once, &update);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sequences_keep_disjointness_and_completeness() {
        // Deterministic pseudo-random windows
        let mut seed: u64 = 0x5eed;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed >> 33
        };

        let mut ranges: Vec<Vec<MessageId>> = Vec::new();
        let mut expected: BTreeSet<MessageId> = BTreeSet::new();

        for _ in 0..200 {
            let start = next() % 500;
            let len = 1 + next() % 8;
            let step = 1 + next() % 3;
            let update: Vec<MessageId> = (0..len).map(|k| MessageId::new(start + k * step)).collect();

            let before: BTreeSet<MessageId> = ranges.iter().flatten().copied().collect();
            ranges = merge_id_ranges(&ranges, &update);
            assert_disjoint(&ranges);

            expected.extend(update.iter().copied());
            let after: BTreeSet<MessageId> = ranges.iter().flatten().copied().collect();
            assert!(before.is_subset(&after));
            assert_eq!(after, expected);
        }
    }

    #[test]
    fn test_intersection_check() {
        assert!(are_sorted_arrays_intersecting(&ids(&[1, 3, 5]), &ids(&[2, 5])));
        assert!(!are_sorted_arrays_intersecting(&ids(&[1, 3, 5]), &ids(&[2, 4, 6])));
        assert!(!are_sorted_arrays_intersecting(&[], &ids(&[1])));
    }

    #[test]
    fn test_local_id_touches_next_server_id() {
        let with_local = vec![MessageId::new(5), MessageId::local(5, 1)];
        let result = merge_id_ranges(&[with_local], &ids(&[6, 7]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 4);
    }

    #[test]
    fn test_merge_listed_ids() {
        let merged = merge_listed_ids(&ids(&[3, 4, 5]), &ids(&[7, 1, 4]));
        assert_eq!(merged, ids(&[1, 3, 4, 5, 7]));
    }

    #[test]
    fn test_merge_pinned_ids_descending() {
        let merged = merge_pinned_ids(&ids(&[9, 4]), &ids(&[6, 9, 12]));
        assert_eq!(merged, ids(&[12, 9, 6, 4]));
    }
}
