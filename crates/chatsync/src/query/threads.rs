//! Thread and message reads

use std::sync::Arc;

use crate::models::{ChatId, Message, MessageId, ThreadId};
use crate::ranges::{self, Direction};
use crate::state::State;

/// Ids the UI should render for a thread
///
/// See [`ranges::viewport_ids`]. Unknown chats and threads yield nothing.
pub fn viewport_ids(
    state: &State,
    chat_id: &ChatId,
    thread_id: ThreadId,
    anchor: Option<MessageId>,
    direction: Direction,
    limit: usize,
) -> Vec<MessageId> {
    state
        .thread(chat_id, thread_id)
        .map(|thread| ranges::viewport_ids(thread, anchor, direction, limit))
        .unwrap_or_default()
}

pub fn listed_ids(state: &State, chat_id: &ChatId, thread_id: ThreadId) -> Vec<MessageId> {
    state
        .thread(chat_id, thread_id)
        .map(|thread| thread.listed_ids.clone())
        .unwrap_or_default()
}

pub fn outlying_lists(state: &State, chat_id: &ChatId, thread_id: ThreadId) -> Vec<Vec<MessageId>> {
    state
        .thread(chat_id, thread_id)
        .map(|thread| thread.outlying_lists.clone())
        .unwrap_or_default()
}

/// First known incoming message after the read position
pub fn first_unread_id(state: &State, chat_id: &ChatId, thread_id: ThreadId) -> Option<MessageId> {
    let thread = state.thread(chat_id, thread_id)?;
    let messages = state.chat_messages(chat_id)?;

    let last_read = thread.last_read_inbox_id.or_else(|| {
        (thread_id == ThreadId::Main)
            .then(|| state.chat(chat_id).and_then(|chat| chat.last_read_inbox_id))
            .flatten()
    });

    ranges::first_id_after(thread, last_read, |id| {
        messages
            .message(id)
            .is_some_and(|message| !message.is_outgoing)
    })
}

pub fn chat_last_message(state: &State, chat_id: &ChatId) -> Option<Arc<Message>> {
    let id = state.chat(chat_id)?.last_message_id?;
    state.chat_messages(chat_id)?.by_id.get(&id).cloned()
}

/// Message entities for `ids`, skipping ids not loaded locally
pub fn thread_messages(state: &State, chat_id: &ChatId, ids: &[MessageId]) -> Vec<Arc<Message>> {
    let Some(messages) = state.chat_messages(chat_id) else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(|id| messages.by_id.get(id).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Action, Store};
    use crate::models::Chat;
    use chrono::{TimeZone, Utc};

    fn make_test_message(id: u64, outgoing: bool) -> Message {
        Message::builder(ChatId::new("c1"), MessageId::new(id))
            .text(format!("m{}", id))
            .date(Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap())
            .outgoing(outgoing)
            .build()
    }

    fn make_test_store() -> Store {
        let mut store = Store::default();
        store.dispatch_all(&[
            Action::UpsertChats {
                chats: vec![Chat::new("c1", "General")],
            },
            Action::AddHistorySlice {
                chat_id: ChatId::new("c1"),
                thread_id: ThreadId::Main,
                ids: (10..=15).map(MessageId::new).collect(),
                messages: (10..=15).map(|id| make_test_message(id, id == 12)).collect(),
                reached_latest: true,
                reached_start: false,
            },
            Action::AddHistorySlice {
                chat_id: ChatId::new("c1"),
                thread_id: ThreadId::Main,
                ids: (1..=3).map(MessageId::new).collect(),
                messages: (1..=3).map(|id| make_test_message(id, false)).collect(),
                reached_latest: false,
                reached_start: true,
            },
        ]);
        store
    }

    #[test]
    fn test_windows() {
        let store = make_test_store();
        let chat_id = ChatId::new("c1");

        assert_eq!(listed_ids(store.state(), &chat_id, ThreadId::Main).len(), 6);
        assert_eq!(
            outlying_lists(store.state(), &chat_id, ThreadId::Main),
            vec![(1..=3).map(MessageId::new).collect::<Vec<_>>()]
        );
        assert_eq!(
            viewport_ids(store.state(), &chat_id, ThreadId::Main, None, Direction::Backwards, 2),
            vec![MessageId::new(14), MessageId::new(15)]
        );
        assert!(viewport_ids(store.state(), &ChatId::new("nope"), ThreadId::Main, None, Direction::Backwards, 2).is_empty());
    }

    #[test]
    fn test_first_unread_skips_outgoing() {
        let mut store = make_test_store();
        let chat_id = ChatId::new("c1");
        store.dispatch(&Action::UpdateReadInbox {
            chat_id: chat_id.clone(),
            thread_id: ThreadId::Main,
            max_id: MessageId::new(11),
            still_unread_count: 3,
        });

        assert_eq!(
            first_unread_id(store.state(), &chat_id, ThreadId::Main),
            Some(MessageId::new(13))
        );
    }

    #[test]
    fn test_last_message_and_entities() {
        let store = make_test_store();
        let chat_id = ChatId::new("c1");

        let ids = [MessageId::new(2), MessageId::new(7), MessageId::new(10)];
        let messages = thread_messages(store.state(), &chat_id, &ids);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "m10");

        // The history slice does not move the chat's last-message pointer
        assert!(chat_last_message(store.state(), &chat_id).is_none());
    }
}
