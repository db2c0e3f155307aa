//! Normalized entity store
//!
//! Every collection sits behind an `Arc` so a new `State` shares everything it
//! did not touch with the previous one. Mutation helpers go through
//! `Arc::make_mut`; they are only called from reducers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Chat, ChatFolder, ChatId, CustomEmoji, FolderId, Message, MessageId, Thread, ThreadId, User,
    UserId,
};
use crate::ranges;

/// Messages and thread windows of one chat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessages {
    #[serde(default)]
    pub by_id: HashMap<MessageId, Arc<Message>>,
    #[serde(default)]
    pub threads: HashMap<ThreadId, Arc<Thread>>,
}

impl ChatMessages {
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.by_id.get(&id).map(Arc::as_ref)
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<&Thread> {
        self.threads.get(&thread_id).map(Arc::as_ref)
    }

}

/// The whole client-side model of one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub chats: Arc<HashMap<ChatId, Arc<Chat>>>,
    #[serde(default)]
    pub messages: Arc<HashMap<ChatId, Arc<ChatMessages>>>,
    #[serde(default)]
    pub users: Arc<HashMap<UserId, Arc<User>>>,
    #[serde(default)]
    pub custom_emojis: Arc<HashMap<String, Arc<CustomEmoji>>>,
    /// Custom folder definitions
    #[serde(default)]
    pub chat_folders: Arc<HashMap<FolderId, Arc<ChatFolder>>>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.get(chat_id).map(Arc::as_ref)
    }

    pub fn chat_messages(&self, chat_id: &ChatId) -> Option<&ChatMessages> {
        self.messages.get(chat_id).map(Arc::as_ref)
    }

    pub fn message(&self, chat_id: &ChatId, id: MessageId) -> Option<&Message> {
        self.chat_messages(chat_id)?.message(id)
    }

    pub fn thread(&self, chat_id: &ChatId, thread_id: ThreadId) -> Option<&Thread> {
        self.chat_messages(chat_id)?.thread(thread_id)
    }

    pub fn folder(&self, folder_id: FolderId) -> Option<&ChatFolder> {
        self.chat_folders.get(&folder_id).map(Arc::as_ref)
    }

    pub fn user(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id).map(Arc::as_ref)
    }

    /// Insert or replace a chat; returns false when it is unchanged
    pub(crate) fn upsert_chat(&mut self, chat: Chat) -> bool {
        if self.chat(&chat.id) == Some(&chat) {
            return false;
        }
        Arc::make_mut(&mut self.chats).insert(chat.id.clone(), Arc::new(chat));
        true
    }

    /// Apply `update` to a copy of the chat and store it if it differs
    pub(crate) fn update_chat(&mut self, chat_id: &ChatId, update: impl FnOnce(&mut Chat)) -> bool {
        let Some(current) = self.chat(chat_id) else {
            return false;
        };
        let mut next = current.clone();
        update(&mut next);
        if &next == current {
            return false;
        }
        Arc::make_mut(&mut self.chats).insert(chat_id.clone(), Arc::new(next));
        true
    }

    fn chat_messages_mut(&mut self, chat_id: &ChatId) -> &mut ChatMessages {
        Arc::make_mut(
            Arc::make_mut(&mut self.messages)
                .entry(chat_id.clone())
                .or_default(),
        )
    }

    /// Insert or replace message entities (windows are not touched)
    pub(crate) fn upsert_messages(
        &mut self,
        chat_id: &ChatId,
        messages: impl IntoIterator<Item = Message>,
    ) -> bool {
        let changed: Vec<Message> = messages
            .into_iter()
            .filter(|message| self.message(chat_id, message.id) != Some(message))
            .collect();
        if changed.is_empty() {
            return false;
        }

        let entry = self.chat_messages_mut(chat_id);
        for message in changed {
            entry.by_id.insert(message.id, Arc::new(message));
        }
        true
    }

    /// Apply `update` to a copy of a message and store it if it differs
    pub(crate) fn update_message(
        &mut self,
        chat_id: &ChatId,
        id: MessageId,
        update: impl FnOnce(&mut Message),
    ) -> bool {
        let Some(current) = self.message(chat_id, id) else {
            return false;
        };
        let mut next = current.clone();
        update(&mut next);
        if &next == current {
            return false;
        }
        self.chat_messages_mut(chat_id).by_id.insert(id, Arc::new(next));
        true
    }

    /// Run a window operation on a copy of a thread
    ///
    /// The closure reports whether it changed anything. The thread (and the
    /// chat's message entry) is only stored when it did, so a no-op leaves
    /// the state untouched.
    pub(crate) fn update_thread(
        &mut self,
        chat_id: &ChatId,
        thread_id: ThreadId,
        update: impl FnOnce(&mut Thread) -> bool,
    ) -> bool {
        let mut next = self.thread(chat_id, thread_id).cloned().unwrap_or_default();
        if !update(&mut next) {
            return false;
        }
        self.chat_messages_mut(chat_id)
            .threads
            .insert(thread_id, Arc::new(next));
        true
    }

    /// Remove messages from the maps and from every window of every thread
    ///
    /// Returns the removed message entities (ids not present locally are
    /// still removed from the windows).
    pub(crate) fn delete_messages(&mut self, chat_id: &ChatId, ids: &[MessageId]) -> (bool, Vec<Message>) {
        if self.chat_messages(chat_id).is_none() || ids.is_empty() {
            return (false, Vec::new());
        }

        let entry = self.chat_messages_mut(chat_id);
        let removed: Vec<Message> = ids
            .iter()
            .filter_map(|id| entry.by_id.remove(id))
            .map(Arc::unwrap_or_clone)
            .collect();

        let mut changed = !removed.is_empty();
        for thread in entry.threads.values_mut() {
            if ids.iter().any(|&id| thread.contains(id) || thread.pinned_ids.contains(&id)) {
                changed |= ranges::remove_ids(Arc::make_mut(thread), ids);
            }
        }
        (changed, removed)
    }

    /// Re-key an optimistic message under its server id
    ///
    /// The message entity, every window containing the local id and the
    /// chat's last-message pointer are rewritten.
    pub(crate) fn replace_message_id(&mut self, chat_id: &ChatId, local: MessageId, server: MessageId) -> bool {
        if self.chat_messages(chat_id).is_none() {
            return false;
        }

        let entry = self.chat_messages_mut(chat_id);
        let mut changed = false;
        if let Some(message) = entry.by_id.remove(&local) {
            let mut message = Arc::unwrap_or_clone(message);
            message.id = server;
            entry.by_id.insert(server, Arc::new(message));
            changed = true;
        }
        for thread in entry.threads.values_mut() {
            if thread.contains(local) || thread.pinned_ids.contains(&local) || thread.last_message_id == Some(local) {
                changed |= ranges::replace_id(Arc::make_mut(thread), local, server);
            }
        }

        changed |= self.update_chat(chat_id, |chat| {
            if chat.last_message_id == Some(local) {
                chat.last_message_id = Some(server);
            }
        });
        changed
    }

    pub(crate) fn upsert_folder(&mut self, folder: ChatFolder) -> bool {
        if self.folder(folder.id) == Some(&folder) {
            return false;
        }
        Arc::make_mut(&mut self.chat_folders).insert(folder.id, Arc::new(folder));
        true
    }

    pub(crate) fn delete_folder(&mut self, folder_id: FolderId) -> bool {
        if !self.chat_folders.contains_key(&folder_id) {
            return false;
        }
        Arc::make_mut(&mut self.chat_folders).remove(&folder_id);
        true
    }

    pub(crate) fn upsert_users(&mut self, users: impl IntoIterator<Item = User>) -> bool {
        let changed: Vec<User> = users
            .into_iter()
            .filter(|user| self.user(&user.id) != Some(user))
            .collect();
        if changed.is_empty() {
            return false;
        }
        let map = Arc::make_mut(&mut self.users);
        for user in changed {
            map.insert(user.id.clone(), Arc::new(user));
        }
        true
    }

    pub(crate) fn upsert_custom_emojis(&mut self, emojis: impl IntoIterator<Item = CustomEmoji>) -> bool {
        let changed: Vec<CustomEmoji> = emojis
            .into_iter()
            .filter(|emoji| self.custom_emojis.get(&emoji.id).map(Arc::as_ref) != Some(emoji))
            .collect();
        if changed.is_empty() {
            return false;
        }
        let map = Arc::make_mut(&mut self.custom_emojis);
        for emoji in changed {
            map.insert(emoji.id.clone(), Arc::new(emoji));
        }
        true
    }
}
