//! Domain models for chats, messages, threads and tabs

mod chat;
mod folder;
mod message;
mod tab;
mod thread;
mod user;

pub use chat::{Chat, ChatId, ChatKind, FolderId};
pub use folder::ChatFolder;
pub use message::{Message, MessageBuilder, MessageId, SendState};
pub use tab::{TabId, TabRecord, TabRole};
pub use thread::{Thread, ThreadId};
pub use user::{CustomEmoji, User, UserId};
