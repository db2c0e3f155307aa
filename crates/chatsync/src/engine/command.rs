//! Writes that need the network, and their outcomes

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::models::{ChatId, MessageId, ThreadId};
use crate::ranges::Direction;

/// A write or fetch that only the master tab may send to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SendMessage {
        chat_id: ChatId,
        #[serde(default)]
        thread_id: ThreadId,
        text: String,
    },
    FetchHistory {
        chat_id: ChatId,
        #[serde(default)]
        thread_id: ThreadId,
        #[serde(default)]
        anchor: Option<MessageId>,
        #[serde(default)]
        direction: Direction,
        limit: usize,
    },
    MarkRead {
        chat_id: ChatId,
        #[serde(default)]
        thread_id: ThreadId,
        max_id: MessageId,
    },
    DeleteMessages {
        chat_id: ChatId,
        ids: Vec<MessageId>,
    },
    EditMessage {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SendMessage { .. } => "send_message",
            Command::FetchHistory { .. } => "fetch_history",
            Command::MarkRead { .. } => "mark_read",
            Command::DeleteMessages { .. } => "delete_messages",
            Command::EditMessage { .. } => "edit_message",
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        match self {
            Command::SendMessage { chat_id, .. }
            | Command::FetchHistory { chat_id, .. }
            | Command::MarkRead { chat_id, .. }
            | Command::DeleteMessages { chat_id, .. }
            | Command::EditMessage { chat_id, .. } => chat_id,
        }
    }
}

/// How a command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    Completed,
    /// The server call failed; not retried
    Failed { error: TransportError },
    /// The command could not be run at all
    Invalid { reason: String },
}

impl CommandOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CommandOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    /// Ran in this tab
    Done(CommandOutcome),
    /// Sent to the master; the result arrives as an engine event
    Forwarded,
    /// Waiting for a master to exist
    Queued,
}

/// Handle returned for every executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTicket {
    pub request_id: u64,
    pub status: TicketStatus,
}
