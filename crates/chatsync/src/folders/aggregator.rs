//! Incremental per-folder ordering and unread totals

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use super::UnreadCounters;
use crate::dispatch::{ChangeScope, Observers, Subscription};
use crate::models::{Chat, ChatFolder, ChatId, FolderId};
use crate::state::State;

/// Sort key of a chat inside one folder
///
/// Pinned chats first in pin order, then most recent activity, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct OrderKey {
    pin_rank: u32,
    last_activity: Reverse<i64>,
    chat_id: ChatId,
}

impl OrderKey {
    fn new(chat: &Chat, pinned_position: Option<u32>) -> Self {
        Self {
            pin_rank: pinned_position.unwrap_or(u32::MAX),
            last_activity: Reverse(
                chat.last_message_at
                    .map(|at| at.timestamp_millis())
                    .unwrap_or(0),
            ),
            chat_id: chat.id.clone(),
        }
    }
}

/// What one chat currently adds to the aggregates
#[derive(Debug, Clone, PartialEq)]
struct Contribution {
    /// Folders the chat belongs to, with its sort key in each
    keys: Vec<(FolderId, OrderKey)>,
    unread: UnreadCounters,
}

fn contribution(chat: &Chat, folders: &HashMap<FolderId, Arc<ChatFolder>>) -> Option<Contribution> {
    // Previewed channels and groups are not listed anywhere
    if chat.is_not_joined {
        return None;
    }

    let builtin = if chat.is_archived() {
        FolderId::ARCHIVED
    } else {
        FolderId::ALL
    };
    let mut keys = vec![(builtin, OrderKey::new(chat, chat.pinned_order))];

    for folder in folders.values() {
        if folder.includes(chat) {
            keys.push((folder.id, OrderKey::new(chat, folder.pinned_position(&chat.id))));
        }
    }
    keys.sort_by_key(|(folder_id, _)| *folder_id);

    Some(Contribution {
        keys,
        unread: UnreadCounters::of_chat(chat),
    })
}

/// Ordered ids of one folder, as delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedIdsChange {
    pub folder_id: FolderId,
    pub ordered_ids: Vec<ChatId>,
}

/// Per-folder ordered chat ids and unread totals, kept up to date by deltas
///
/// A chat update debits the chat's previous contribution from every folder
/// it was in and credits the new one. Subscribers are notified after the
/// whole update is applied, and only for folders whose value changed.
pub struct FolderAggregator {
    folders: HashMap<FolderId, Arc<ChatFolder>>,
    contributions: HashMap<ChatId, Contribution>,
    ordered: HashMap<FolderId, BTreeSet<OrderKey>>,
    counters: HashMap<FolderId, UnreadCounters>,
    dirty: BTreeSet<FolderId>,
    published_ids: HashMap<FolderId, Vec<ChatId>>,
    published_counters: HashMap<FolderId, UnreadCounters>,
    order_observers: Observers<OrderedIdsChange>,
    counter_observers: Observers<HashMap<FolderId, UnreadCounters>>,
}

impl FolderAggregator {
    pub fn new() -> Self {
        let mut aggregator = Self {
            folders: HashMap::new(),
            contributions: HashMap::new(),
            ordered: HashMap::new(),
            counters: HashMap::new(),
            dirty: BTreeSet::new(),
            published_ids: HashMap::new(),
            published_counters: HashMap::new(),
            order_observers: Observers::new(),
            counter_observers: Observers::new(),
        };
        aggregator.ensure_builtin();
        aggregator
    }

    fn ensure_builtin(&mut self) {
        for folder_id in [FolderId::ALL, FolderId::ARCHIVED] {
            self.ordered.entry(folder_id).or_default();
            self.counters.entry(folder_id).or_default();
        }
    }

    /// Recompute everything from `state`
    ///
    /// Used on hydration only. Contributions are computed in parallel.
    pub fn rebuild(&mut self, state: &State) {
        let start = std::time::Instant::now();
        self.folders = state.chat_folders.as_ref().clone();

        let folders = &self.folders;
        let contributions: HashMap<ChatId, Contribution> = state
            .chats
            .par_iter()
            .filter_map(|(chat_id, chat)| contribution(chat, folders).map(|c| (chat_id.clone(), c)))
            .collect();

        self.dirty.extend(self.ordered.keys().copied());
        self.ordered.clear();
        self.counters.clear();
        self.ensure_builtin();
        for folder_id in self.folders.keys() {
            self.ordered.entry(*folder_id).or_default();
            self.counters.entry(*folder_id).or_default();
            self.dirty.insert(*folder_id);
        }

        for contribution in contributions.values() {
            self.credit(contribution);
        }
        self.contributions = contributions;

        info!(
            "Rebuilt folder aggregates: {} chats, {} folders in {}ms",
            self.contributions.len(),
            self.ordered.len(),
            start.elapsed().as_millis()
        );
        self.publish();
    }

    /// Bring the aggregates in line with `state` after an action
    pub fn apply(&mut self, state: &State, scope: &ChangeScope) {
        self.apply_all(state, std::slice::from_ref(scope));
    }

    /// Apply the scopes of a batch of actions, publishing once
    ///
    /// `state` is the state after the whole batch.
    pub fn apply_all(&mut self, state: &State, scopes: &[ChangeScope]) {
        if scopes.contains(&ChangeScope::Everything) {
            self.rebuild(state);
            return;
        }

        for scope in scopes {
            match scope {
                ChangeScope::Nothing | ChangeScope::Everything => {}
                ChangeScope::Chats(chat_ids) => {
                    for chat_id in chat_ids {
                        self.update_chat(state, chat_id);
                    }
                }
                ChangeScope::Folders(folder_ids) => {
                    for folder_id in folder_ids {
                        self.update_folder(state, *folder_id);
                    }
                }
            }
        }
        self.publish();
    }

    fn debit(&mut self, contribution: &Contribution) {
        for (folder_id, key) in &contribution.keys {
            if let Some(set) = self.ordered.get_mut(folder_id) {
                set.remove(key);
            }
            if let Some(total) = self.counters.get_mut(folder_id) {
                *total -= contribution.unread;
            }
            self.dirty.insert(*folder_id);
        }
    }

    fn credit(&mut self, contribution: &Contribution) {
        for (folder_id, key) in &contribution.keys {
            self.ordered.entry(*folder_id).or_default().insert(key.clone());
            *self.counters.entry(*folder_id).or_default() += contribution.unread;
            self.dirty.insert(*folder_id);
        }
    }

    fn update_chat(&mut self, state: &State, chat_id: &ChatId) {
        let next = state
            .chat(chat_id)
            .and_then(|chat| contribution(chat, &self.folders));
        let previous = self.contributions.get(chat_id);
        if previous == next.as_ref() {
            return;
        }

        if let Some(previous) = self.contributions.remove(chat_id) {
            self.debit(&previous);
        }
        if let Some(next) = next {
            self.credit(&next);
            self.contributions.insert(chat_id.clone(), next);
        }
    }

    /// A custom folder definition changed; rescan that folder only
    fn update_folder(&mut self, state: &State, folder_id: FolderId) {
        if folder_id.is_builtin() {
            return;
        }
        debug!("Rescanning folder {}", folder_id.0);

        // Drop the folder's old membership from every contribution
        if let Some(set) = self.ordered.remove(&folder_id) {
            for key in set {
                if let Some(contribution) = self.contributions.get_mut(&key.chat_id) {
                    contribution.keys.retain(|(id, _)| *id != folder_id);
                }
            }
        }
        self.counters.remove(&folder_id);
        self.dirty.insert(folder_id);

        let Some(folder) = state.chat_folders.get(&folder_id).cloned() else {
            self.folders.remove(&folder_id);
            return;
        };
        self.folders.insert(folder_id, folder.clone());

        let mut set = BTreeSet::new();
        let mut total = UnreadCounters::default();
        for (chat_id, chat) in state.chats.iter() {
            let Some(contribution) = self.contributions.get_mut(chat_id) else {
                continue;
            };
            if folder.includes(chat) {
                let key = OrderKey::new(chat, folder.pinned_position(chat_id));
                set.insert(key.clone());
                total += contribution.unread;
                contribution.keys.push((folder_id, key));
                contribution.keys.sort_by_key(|(id, _)| *id);
            }
        }
        self.ordered.insert(folder_id, set);
        self.counters.insert(folder_id, total);
    }

    /// Notify subscribers of folders whose value changed
    fn publish(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        let mut counters_changed = false;

        for folder_id in dirty {
            let ordered_ids = self.ordered_ids(folder_id);
            if self.published_ids.get(&folder_id) != Some(&ordered_ids) {
                self.published_ids.insert(folder_id, ordered_ids.clone());
                self.order_observers.notify(&OrderedIdsChange {
                    folder_id,
                    ordered_ids,
                });
            }

            let counters = self.counters.get(&folder_id).copied();
            if self.published_counters.get(&folder_id).copied() != counters {
                match counters {
                    Some(counters) => self.published_counters.insert(folder_id, counters),
                    None => self.published_counters.remove(&folder_id),
                };
                counters_changed = true;
            }
        }

        if counters_changed {
            self.counter_observers.notify(&self.published_counters);
        }
    }

    /// Current ordered chat ids of a folder (empty for unknown folders)
    pub fn ordered_ids(&self, folder_id: FolderId) -> Vec<ChatId> {
        self.ordered
            .get(&folder_id)
            .map(|set| set.iter().map(|key| key.chat_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn unread_counters(&self, folder_id: FolderId) -> UnreadCounters {
        self.counters.get(&folder_id).copied().unwrap_or_default()
    }

    pub fn all_unread_counters(&self) -> &HashMap<FolderId, UnreadCounters> {
        &self.published_counters
    }

    /// Folders with an aggregate, built-in ones included
    pub fn folder_ids(&self) -> Vec<FolderId> {
        let mut ids: Vec<FolderId> = self.ordered.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Be told when `folder_id`'s ordered ids change
    pub fn subscribe_ordered_ids(
        &self,
        folder_id: FolderId,
        mut callback: impl FnMut(&[ChatId]) + Send + 'static,
    ) -> Subscription {
        self.order_observers.subscribe(move |change: &OrderedIdsChange| {
            if change.folder_id == folder_id {
                callback(&change.ordered_ids);
            }
        })
    }

    /// Be told when any folder's unread totals change
    pub fn subscribe_unread_counters(
        &self,
        callback: impl FnMut(&HashMap<FolderId, UnreadCounters>) + Send + 'static,
    ) -> Subscription {
        self.counter_observers.subscribe(callback)
    }
}

impl Default for FolderAggregator {
    fn default() -> Self {
        Self::new()
    }
}
