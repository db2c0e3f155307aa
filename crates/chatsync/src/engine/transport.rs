//! The seam to the network layer
//!
//! The engine never manages connections. It calls a [`Transport`] for the
//! requests it issues and turns pushed [`UpdateEvent`]s into actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::{Action, ChatPatch};
use crate::error::TransportError;
use crate::models::{Chat, ChatId, Message, MessageId, ThreadId};
use crate::ranges::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub chat_id: ChatId,
    pub thread_id: ThreadId,
    pub anchor: Option<MessageId>,
    pub direction: Direction,
    pub limit: usize,
}

/// One page of history, ids ascending
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySlice {
    pub ids: Vec<MessageId>,
    pub messages: Vec<Message>,
    pub reached_latest: bool,
    pub reached_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: MessageId,
    pub date: DateTime<Utc>,
}

/// Requests the master tab sends to the server
pub trait Transport: Send {
    fn fetch_history(&mut self, request: &HistoryRequest) -> Result<HistorySlice, TransportError>;

    fn send_message(
        &mut self,
        chat_id: &ChatId,
        thread_id: ThreadId,
        text: &str,
    ) -> Result<SentMessage, TransportError>;

    /// Returns how many messages of the thread are still unread
    fn mark_read(
        &mut self,
        chat_id: &ChatId,
        thread_id: ThreadId,
        max_id: MessageId,
    ) -> Result<u32, TransportError>;

    fn delete_messages(&mut self, chat_id: &ChatId, ids: &[MessageId]) -> Result<(), TransportError>;

    /// Returns the server's edit timestamp
    fn edit_message(
        &mut self,
        chat_id: &ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<DateTime<Utc>, TransportError>;
}

/// Update pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateEvent {
    NewMessage {
        message: Message,
    },
    EditedMessage {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        edited_at: DateTime<Utc>,
    },
    DeletedMessages {
        chat_id: ChatId,
        ids: Vec<MessageId>,
    },
    ReadInbox {
        chat_id: ChatId,
        #[serde(default)]
        thread_id: ThreadId,
        max_id: MessageId,
        still_unread_count: u32,
    },
    ReadOutbox {
        chat_id: ChatId,
        max_id: MessageId,
    },
    ChatUpdated {
        chat: Chat,
    },
    ChatPatched {
        chat_id: ChatId,
        patch: ChatPatch,
    },
}

impl UpdateEvent {
    pub fn into_actions(self) -> Vec<Action> {
        let action = match self {
            UpdateEvent::NewMessage { message } => Action::NewMessage { message },
            UpdateEvent::EditedMessage {
                chat_id,
                message_id,
                text,
                edited_at,
            } => Action::EditMessage {
                chat_id,
                message_id,
                text,
                edited_at,
            },
            UpdateEvent::DeletedMessages { chat_id, ids } => Action::DeleteMessages { chat_id, ids },
            UpdateEvent::ReadInbox {
                chat_id,
                thread_id,
                max_id,
                still_unread_count,
            } => Action::UpdateReadInbox {
                chat_id,
                thread_id,
                max_id,
                still_unread_count,
            },
            UpdateEvent::ReadOutbox { chat_id, max_id } => Action::UpdateReadOutbox { chat_id, max_id },
            UpdateEvent::ChatUpdated { chat } => Action::UpsertChats { chats: vec![chat] },
            UpdateEvent::ChatPatched { chat_id, patch } => Action::UpdateChat { chat_id, patch },
        };
        vec![action]
    }
}
