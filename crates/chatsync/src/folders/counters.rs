use std::ops::{AddAssign, SubAssign};

use serde::{Deserialize, Serialize};

use crate::models::Chat;

/// Unread totals of a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnreadCounters {
    /// Chats with unread messages or an unread mark
    pub chats_count: u32,
    pub messages_count: u32,
    pub mentions_count: u32,
    /// Unread messages in chats that are not muted
    pub notifications_count: u32,
}

impl UnreadCounters {
    /// What a single chat adds to every folder it belongs to
    pub fn of_chat(chat: &Chat) -> Self {
        let has_unread = chat.has_unread();
        let notifications = if chat.is_muted {
            0
        } else if chat.unread_count > 0 {
            chat.unread_count
        } else {
            u32::from(chat.is_marked_unread)
        };

        Self {
            chats_count: u32::from(has_unread),
            messages_count: chat.unread_count,
            mentions_count: chat.unread_mentions_count,
            notifications_count: notifications,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for UnreadCounters {
    fn add_assign(&mut self, other: Self) {
        self.chats_count += other.chats_count;
        self.messages_count += other.messages_count;
        self.mentions_count += other.mentions_count;
        self.notifications_count += other.notifications_count;
    }
}

impl SubAssign for UnreadCounters {
    fn sub_assign(&mut self, other: Self) {
        self.chats_count = self.chats_count.saturating_sub(other.chats_count);
        self.messages_count = self.messages_count.saturating_sub(other.messages_count);
        self.mentions_count = self.mentions_count.saturating_sub(other.mentions_count);
        self.notifications_count = self.notifications_count.saturating_sub(other.notifications_count);
    }
}
