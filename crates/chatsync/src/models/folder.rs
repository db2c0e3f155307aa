//! Custom chat folder definitions

use serde::{Deserialize, Serialize};

use super::{Chat, ChatId, ChatKind, FolderId};

/// A user-defined folder: explicit chat lists plus kind-based filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatFolder {
    pub id: FolderId,
    pub title: String,
    #[serde(default)]
    pub included_chat_ids: Vec<ChatId>,
    #[serde(default)]
    pub excluded_chat_ids: Vec<ChatId>,
    /// Pinned chats in display order; they are always members
    #[serde(default)]
    pub pinned_chat_ids: Vec<ChatId>,
    #[serde(default)]
    pub contacts: bool,
    #[serde(default)]
    pub non_contacts: bool,
    #[serde(default)]
    pub groups: bool,
    #[serde(default)]
    pub channels: bool,
    #[serde(default)]
    pub bots: bool,
    #[serde(default)]
    pub exclude_muted: bool,
    #[serde(default)]
    pub exclude_read: bool,
    #[serde(default)]
    pub exclude_archived: bool,
}

impl ChatFolder {
    pub fn new(id: FolderId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Whether `chat` belongs to this folder
    pub fn includes(&self, chat: &Chat) -> bool {
        if self.pinned_chat_ids.contains(&chat.id) {
            return true;
        }
        if self.excluded_chat_ids.contains(&chat.id) {
            return false;
        }
        if self.included_chat_ids.contains(&chat.id) {
            return true;
        }
        if self.exclude_archived && chat.is_archived() {
            return false;
        }
        if self.exclude_muted && chat.is_muted {
            return false;
        }
        if self.exclude_read && !chat.has_unread() {
            return false;
        }

        match chat.kind {
            ChatKind::Private if chat.is_contact => self.contacts,
            ChatKind::Private => self.non_contacts,
            ChatKind::BasicGroup | ChatKind::SuperGroup => self.groups,
            ChatKind::Channel => self.channels,
            ChatKind::Bot => self.bots,
        }
    }

    /// Position of `chat_id` in this folder's pinned block
    pub fn pinned_position(&self, chat_id: &ChatId) -> Option<u32> {
        self.pinned_chat_ids
            .iter()
            .position(|id| id == chat_id)
            .map(|pos| pos as u32)
    }
}
