//! Chat model and folder identifiers

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// Unique identifier for a chat
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a chat folder (the default is `ALL`)
///
/// Serialized as a number. Deserialization also accepts the stringified
/// form that JSON map keys take, including when the value is buffered by a
/// tagged enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FolderId(pub i32);

impl<'de> Deserialize<'de> for FolderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FolderIdVisitor;

        impl Visitor<'_> for FolderIdVisitor {
            type Value = FolderId;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a folder id as an integer or numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FolderId, E> {
                i32::try_from(v).map(FolderId).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FolderId, E> {
                i32::try_from(v).map(FolderId).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FolderId, E> {
                v.parse().map(FolderId).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FolderIdVisitor)
    }
}

impl FolderId {
    /// Every listed chat that is not archived
    pub const ALL: FolderId = FolderId(0);
    /// Archived chats
    pub const ARCHIVED: FolderId = FolderId(1);
    /// Saved-messages dialogs
    pub const SAVED: FolderId = FolderId(-1);

    pub fn is_builtin(&self) -> bool {
        matches!(*self, Self::ALL | Self::ARCHIVED | Self::SAVED)
    }
}

/// Chat classification, used by custom folder filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    #[default]
    Private,
    BasicGroup,
    SuperGroup,
    Channel,
    Bot,
}

impl ChatKind {
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::BasicGroup | ChatKind::SuperGroup)
    }
}

/// A chat as held by the entity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: String,
    /// `FolderId::ALL` or `FolderId::ARCHIVED`
    pub folder_id: FolderId,
    #[serde(default)]
    pub is_contact: bool,
    #[serde(default)]
    pub is_muted: bool,
    /// Channels/groups the user only previews
    #[serde(default)]
    pub is_not_joined: bool,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub unread_mentions_count: u32,
    #[serde(default)]
    pub is_marked_unread: bool,
    /// Position within the pinned block of the chat's list (0 = top)
    #[serde(default)]
    pub pinned_order: Option<u32>,
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_inbox_id: Option<MessageId>,
    #[serde(default)]
    pub last_read_outbox_id: Option<MessageId>,
}

impl Chat {
    /// Create a new chat in the main list
    pub fn new(id: impl Into<ChatId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChatKind::Private,
            title: title.into(),
            folder_id: FolderId::ALL,
            is_contact: false,
            is_muted: false,
            is_not_joined: false,
            unread_count: 0,
            unread_mentions_count: 0,
            is_marked_unread: false,
            pinned_order: None,
            last_message_id: None,
            last_message_at: None,
            last_read_inbox_id: None,
            last_read_outbox_id: None,
        }
    }

    pub fn with_kind(mut self, kind: ChatKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_unread(mut self, unread_count: u32, unread_mentions_count: u32) -> Self {
        self.unread_count = unread_count;
        self.unread_mentions_count = unread_mentions_count;
        self
    }

    pub fn with_last_message(mut self, id: MessageId, at: DateTime<Utc>) -> Self {
        self.last_message_id = Some(id);
        self.last_message_at = Some(at);
        self
    }

    pub fn archived(mut self) -> Self {
        self.folder_id = FolderId::ARCHIVED;
        self
    }

    pub fn muted(mut self) -> Self {
        self.is_muted = true;
        self
    }

    pub fn pinned(mut self, order: u32) -> Self {
        self.pinned_order = Some(order);
        self
    }

    pub fn is_archived(&self) -> bool {
        self.folder_id == FolderId::ARCHIVED
    }

    pub fn has_unread(&self) -> bool {
        self.unread_count > 0 || self.is_marked_unread
    }
}
