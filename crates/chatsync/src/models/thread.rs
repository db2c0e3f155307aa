//! Thread model: a message subtree of a chat and its known id windows

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MessageId;

/// Identifies a thread within a chat
///
/// `Main` is the implicit thread holding the regular chat history. Reply
/// threads and forum topics are identified by their root message id.
/// Serialized as `"main"` or the root id so it can key JSON maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThreadId {
    #[default]
    Main,
    Topic(u64),
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadId::Main => f.write_str("main"),
            ThreadId::Topic(root) => write!(f, "{}", root),
        }
    }
}

impl FromStr for ThreadId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "main" {
            Ok(ThreadId::Main)
        } else {
            s.parse().map(ThreadId::Topic)
        }
    }
}

impl TryFrom<String> for ThreadId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ThreadId> for String {
    fn from(id: ThreadId) -> Self {
        id.to_string()
    }
}

/// Locally known id windows and read bookkeeping for one thread
///
/// `listed_ids` is the canonical window anchored at the newest message and
/// growing backwards as history loads. `outlying_lists` are windows fetched
/// away from it (search hits, deep links); they never overlap or touch each
/// other. `pinned_ids` is kept in display order, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub listed_ids: Vec<MessageId>,
    #[serde(default)]
    pub outlying_lists: Vec<Vec<MessageId>>,
    #[serde(default)]
    pub pinned_ids: Vec<MessageId>,
    #[serde(default)]
    pub last_read_inbox_id: Option<MessageId>,
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    /// Oldest id of the history once the beginning has been reached
    #[serde(default)]
    pub first_message_id: Option<MessageId>,
    /// Unread messages in a topic (the main thread uses the chat counters)
    #[serde(default)]
    pub unread_count: u32,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any window of this thread contains `id`
    pub fn contains(&self, id: MessageId) -> bool {
        self.listed_ids.binary_search(&id).is_ok()
            || self
                .outlying_lists
                .iter()
                .any(|list| list.binary_search(&id).is_ok())
    }

    /// Whether the listed window reaches the oldest message of the thread
    pub fn has_reached_start(&self) -> bool {
        match (self.first_message_id, self.listed_ids.first()) {
            (Some(first), Some(listed_first)) => *listed_first <= first,
            _ => false,
        }
    }
}
