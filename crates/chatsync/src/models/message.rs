//! Message model and the message id space

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChatId, ThreadId, UserId};

/// Identifier of a message within a chat
///
/// Server-assigned ids have `local == 0` and grow monotonically per chat.
/// Optimistically created messages get a local id `{ server: n, local: k }`
/// where `n` is the last server id known when the message was created, so a
/// local id sorts after `n` and before `n + 1`.
///
/// Serialized as `"42"` or `"42.1"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId {
    pub server: u64,
    pub local: u32,
}

impl MessageId {
    /// Create a server-assigned id
    pub const fn new(server: u64) -> Self {
        Self { server, local: 0 }
    }

    /// Create a local id placed after `after`
    pub const fn local(after: u64, seq: u32) -> Self {
        Self {
            server: after,
            local: seq,
        }
    }

    pub fn is_local(&self) -> bool {
        self.local != 0
    }

    /// The smallest server id strictly greater than this id
    ///
    /// Two sorted windows touch when the later one starts at or before the
    /// successor of the earlier one's last id.
    pub fn successor(&self) -> Self {
        Self::new(self.server.saturating_add(1))
    }
}

impl From<u64> for MessageId {
    fn from(server: u64) -> Self {
        Self::new(server)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((server, local)) => Ok(Self::local(server.parse()?, local.parse()?)),
            None => Ok(Self::new(s.parse()?)),
        }
    }
}

impl TryFrom<String> for MessageId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            write!(f, "{}.{}", self.server, self.local)
        } else {
            write!(f, "{}", self.server)
        }
    }
}

/// Delivery state of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    Pending,
    #[default]
    Sent,
    Failed,
}

/// A single message in a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Thread the message belongs to (`Main` for regular history)
    pub thread_id: ThreadId,
    pub sender_id: Option<UserId>,
    pub text: String,
    pub date: DateTime<Utc>,
    pub is_outgoing: bool,
    #[serde(default)]
    pub send_state: SendState,
    /// Whether the current user is mentioned in this message
    #[serde(default)]
    pub is_mentioned: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(chat_id: ChatId, id: MessageId) -> MessageBuilder {
        MessageBuilder::new(chat_id, id)
    }

    pub fn is_local(&self) -> bool {
        self.id.is_local()
    }

    pub fn is_failed(&self) -> bool {
        self.send_state == SendState::Failed
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    chat_id: ChatId,
    thread_id: ThreadId,
    sender_id: Option<UserId>,
    text: String,
    date: Option<DateTime<Utc>>,
    is_outgoing: bool,
    send_state: SendState,
    is_mentioned: bool,
}

impl MessageBuilder {
    fn new(chat_id: ChatId, id: MessageId) -> Self {
        Self {
            id,
            chat_id,
            thread_id: ThreadId::Main,
            sender_id: None,
            text: String::new(),
            date: None,
            is_outgoing: false,
            send_state: SendState::Sent,
            is_mentioned: false,
        }
    }

    pub fn thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn sender(mut self, sender_id: impl Into<UserId>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn outgoing(mut self, is_outgoing: bool) -> Self {
        self.is_outgoing = is_outgoing;
        self
    }

    pub fn send_state(mut self, send_state: SendState) -> Self {
        self.send_state = send_state;
        self
    }

    pub fn mentioned(mut self, is_mentioned: bool) -> Self {
        self.is_mentioned = is_mentioned;
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            thread_id: self.thread_id,
            sender_id: self.sender_id,
            text: self.text,
            date: self.date.unwrap_or_else(Utc::now),
            is_outgoing: self.is_outgoing,
            send_state: self.send_state,
            is_mentioned: self.is_mentioned,
            edited_at: None,
        }
    }
}
