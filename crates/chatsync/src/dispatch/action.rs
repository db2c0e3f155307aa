//! Actions: the only way to change the entity store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Chat, ChatFolder, ChatId, CustomEmoji, FolderId, Message, MessageId, ThreadId, User,
};
use crate::state::State;

/// Partial update of a chat's scalar fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_contact: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_not_joined: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_marked_unread: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_mentions_count: Option<u32>,
}

impl ChatPatch {
    pub fn apply(&self, chat: &mut Chat) {
        if let Some(title) = &self.title {
            chat.title = title.clone();
        }
        if let Some(is_muted) = self.is_muted {
            chat.is_muted = is_muted;
        }
        if let Some(is_contact) = self.is_contact {
            chat.is_contact = is_contact;
        }
        if let Some(is_not_joined) = self.is_not_joined {
            chat.is_not_joined = is_not_joined;
        }
        if let Some(is_marked_unread) = self.is_marked_unread {
            chat.is_marked_unread = is_marked_unread;
        }
        if let Some(unread_count) = self.unread_count {
            chat.unread_count = unread_count;
        }
        if let Some(unread_mentions_count) = self.unread_mentions_count {
            chat.unread_mentions_count = unread_mentions_count;
        }
    }
}

/// A state transition, applied by `reduce`
///
/// Actions are plain data so they can be broadcast to other tabs as deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    UpsertChats {
        chats: Vec<Chat>,
    },
    UpdateChat {
        chat_id: ChatId,
        patch: ChatPatch,
    },
    /// Store message entities without touching any id window
    UpsertMessages {
        chat_id: ChatId,
        messages: Vec<Message>,
    },
    /// Result of a history fetch
    AddHistorySlice {
        chat_id: ChatId,
        thread_id: ThreadId,
        ids: Vec<MessageId>,
        messages: Vec<Message>,
        /// The slice contains the newest message of the thread
        reached_latest: bool,
        /// The slice contains the oldest message of the thread
        reached_start: bool,
    },
    NewMessage {
        message: Message,
    },
    /// Optimistic insert of an outgoing message under a local id
    SendMessageLocal {
        message: Message,
    },
    ConfirmSentMessage {
        chat_id: ChatId,
        local_id: MessageId,
        server_id: MessageId,
        date: DateTime<Utc>,
    },
    MarkMessageFailed {
        chat_id: ChatId,
        message_id: MessageId,
    },
    EditMessage {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        edited_at: DateTime<Utc>,
    },
    DeleteMessages {
        chat_id: ChatId,
        ids: Vec<MessageId>,
    },
    UpdateReadInbox {
        chat_id: ChatId,
        thread_id: ThreadId,
        max_id: MessageId,
        still_unread_count: u32,
    },
    UpdateReadOutbox {
        chat_id: ChatId,
        max_id: MessageId,
    },
    SetPinnedIds {
        chat_id: ChatId,
        thread_id: ThreadId,
        ids: Vec<MessageId>,
        /// Replace the list instead of merging into it
        replace: bool,
    },
    /// Move to `ALL`/`ARCHIVED`, or add to a custom folder's include list
    MoveChatToFolder {
        chat_id: ChatId,
        folder_id: FolderId,
    },
    SetChatPinned {
        chat_id: ChatId,
        pinned_order: Option<u32>,
    },
    UpsertFolder {
        folder: ChatFolder,
    },
    DeleteFolder {
        folder_id: FolderId,
    },
    UpsertUsers {
        users: Vec<User>,
    },
    UpsertCustomEmojis {
        emojis: Vec<CustomEmoji>,
    },
    /// Swap in a whole state (hydration from a snapshot or another tab)
    ReplaceState {
        state: Box<State>,
    },
}

/// Which folder aggregates an action can affect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
    Nothing,
    Chats(Vec<ChatId>),
    Folders(Vec<FolderId>),
    Everything,
}

impl Action {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpsertChats { .. } => "upsert_chats",
            Action::UpdateChat { .. } => "update_chat",
            Action::UpsertMessages { .. } => "upsert_messages",
            Action::AddHistorySlice { .. } => "add_history_slice",
            Action::NewMessage { .. } => "new_message",
            Action::SendMessageLocal { .. } => "send_message_local",
            Action::ConfirmSentMessage { .. } => "confirm_sent_message",
            Action::MarkMessageFailed { .. } => "mark_message_failed",
            Action::EditMessage { .. } => "edit_message",
            Action::DeleteMessages { .. } => "delete_messages",
            Action::UpdateReadInbox { .. } => "update_read_inbox",
            Action::UpdateReadOutbox { .. } => "update_read_outbox",
            Action::SetPinnedIds { .. } => "set_pinned_ids",
            Action::MoveChatToFolder { .. } => "move_chat_to_folder",
            Action::SetChatPinned { .. } => "set_chat_pinned",
            Action::UpsertFolder { .. } => "upsert_folder",
            Action::DeleteFolder { .. } => "delete_folder",
            Action::UpsertUsers { .. } => "upsert_users",
            Action::UpsertCustomEmojis { .. } => "upsert_custom_emojis",
            Action::ReplaceState { .. } => "replace_state",
        }
    }

    /// The part of the folder aggregates this action may invalidate
    pub fn scope(&self) -> ChangeScope {
        match self {
            Action::UpsertChats { chats } => {
                ChangeScope::Chats(chats.iter().map(|chat| chat.id.clone()).collect())
            }
            Action::UpdateChat { chat_id, .. }
            | Action::ConfirmSentMessage { chat_id, .. }
            | Action::DeleteMessages { chat_id, .. }
            | Action::UpdateReadInbox { chat_id, .. }
            | Action::SetChatPinned { chat_id, .. } => ChangeScope::Chats(vec![chat_id.clone()]),
            Action::NewMessage { message } | Action::SendMessageLocal { message } => {
                ChangeScope::Chats(vec![message.chat_id.clone()])
            }
            Action::MoveChatToFolder { chat_id, folder_id } => {
                if folder_id.is_builtin() {
                    ChangeScope::Chats(vec![chat_id.clone()])
                } else {
                    ChangeScope::Folders(vec![*folder_id])
                }
            }
            Action::UpsertFolder { folder } => ChangeScope::Folders(vec![folder.id]),
            Action::DeleteFolder { folder_id } => ChangeScope::Folders(vec![*folder_id]),
            Action::ReplaceState { .. } => ChangeScope::Everything,
            Action::UpsertMessages { .. }
            | Action::AddHistorySlice { .. }
            | Action::MarkMessageFailed { .. }
            | Action::EditMessage { .. }
            | Action::UpdateReadOutbox { .. }
            | Action::SetPinnedIds { .. }
            | Action::UpsertUsers { .. }
            | Action::UpsertCustomEmojis { .. } => ChangeScope::Nothing,
        }
    }
}
