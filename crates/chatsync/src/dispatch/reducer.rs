//! Reducers: `(state, action) -> changed`
//!
//! Reducers mutate a copy-on-write `State` and report whether anything
//! changed. They never perform I/O.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::action::{Action, ChatPatch};
use crate::models::{
    ChatFolder, ChatId, FolderId, Message, MessageId, SendState, ThreadId,
};
use crate::ranges;
use crate::state::State;

/// Apply one action; returns whether the state changed
pub fn reduce(state: &mut State, action: &Action) -> bool {
    let changed = match action {
        Action::UpsertChats { chats } => chats
            .iter()
            .fold(false, |changed, chat| state.upsert_chat(chat.clone()) | changed),
        Action::UpdateChat { chat_id, patch } => reduce_update_chat(state, chat_id, patch),
        Action::UpsertMessages { chat_id, messages } => {
            state.upsert_messages(chat_id, messages.iter().cloned())
        }
        Action::AddHistorySlice {
            chat_id,
            thread_id,
            ids,
            messages,
            reached_latest,
            reached_start,
        } => reduce_history_slice(
            state,
            chat_id,
            *thread_id,
            ids,
            messages,
            *reached_latest,
            *reached_start,
        ),
        Action::NewMessage { message } => reduce_new_message(state, message.clone()),
        Action::SendMessageLocal { message } => {
            let mut message = message.clone();
            message.is_outgoing = true;
            message.send_state = SendState::Pending;
            reduce_new_message(state, message)
        }
        Action::ConfirmSentMessage {
            chat_id,
            local_id,
            server_id,
            date,
        } => reduce_confirm_sent(state, chat_id, *local_id, *server_id, *date),
        Action::MarkMessageFailed { chat_id, message_id } => {
            state.update_message(chat_id, *message_id, |message| {
                message.send_state = SendState::Failed;
            })
        }
        Action::EditMessage {
            chat_id,
            message_id,
            text,
            edited_at,
        } => state.update_message(chat_id, *message_id, |message| {
            message.text = text.clone();
            message.edited_at = Some(*edited_at);
        }),
        Action::DeleteMessages { chat_id, ids } => reduce_delete_messages(state, chat_id, ids),
        Action::UpdateReadInbox {
            chat_id,
            thread_id,
            max_id,
            still_unread_count,
        } => reduce_read_inbox(state, chat_id, *thread_id, *max_id, *still_unread_count),
        Action::UpdateReadOutbox { chat_id, max_id } => state.update_chat(chat_id, |chat| {
            if chat.last_read_outbox_id.is_none_or(|read| read < *max_id) {
                chat.last_read_outbox_id = Some(*max_id);
            }
        }),
        Action::SetPinnedIds {
            chat_id,
            thread_id,
            ids,
            replace,
        } => state.update_thread(chat_id, *thread_id, |thread| {
            let pinned = if *replace {
                let mut pinned = ids.clone();
                ranges::order_pinned_ids(&mut pinned);
                pinned
            } else {
                ranges::merge_pinned_ids(&thread.pinned_ids, ids)
            };
            let changed = pinned != thread.pinned_ids;
            thread.pinned_ids = pinned;
            changed
        }),
        Action::MoveChatToFolder { chat_id, folder_id } => {
            reduce_move_to_folder(state, chat_id, *folder_id)
        }
        Action::SetChatPinned {
            chat_id,
            pinned_order,
        } => state.update_chat(chat_id, |chat| chat.pinned_order = *pinned_order),
        Action::UpsertFolder { folder } => state.upsert_folder(folder.clone()),
        Action::DeleteFolder { folder_id } => state.delete_folder(*folder_id),
        Action::UpsertUsers { users } => state.upsert_users(users.iter().cloned()),
        Action::UpsertCustomEmojis { emojis } => state.upsert_custom_emojis(emojis.iter().cloned()),
        Action::ReplaceState { state: next } => {
            *state = next.as_ref().clone();
            true
        }
    };

    if changed {
        debug!("Applied {}", action.kind());
    }
    changed
}

fn reduce_update_chat(state: &mut State, chat_id: &ChatId, patch: &ChatPatch) -> bool {
    if state.chat(chat_id).is_none() {
        warn!("Ignoring update for unknown chat {}", chat_id);
        return false;
    }
    state.update_chat(chat_id, |chat| patch.apply(chat))
}

fn reduce_history_slice(
    state: &mut State,
    chat_id: &ChatId,
    thread_id: ThreadId,
    ids: &[MessageId],
    messages: &[Message],
    reached_latest: bool,
    reached_start: bool,
) -> bool {
    let mut changed = state.upsert_messages(chat_id, messages.iter().cloned());
    changed |= state.update_thread(chat_id, thread_id, |thread| {
        let mut changed = ranges::add_history_slice(thread, ids, reached_latest);
        if reached_start {
            let oldest = ids.iter().min().copied();
            if oldest.is_some() && thread.first_message_id != oldest {
                thread.first_message_id = oldest;
                changed = true;
            }
        }
        changed
    });
    changed
}

fn reduce_new_message(state: &mut State, message: Message) -> bool {
    let chat_id = message.chat_id.clone();
    let id = message.id;
    let is_known = state.message(&chat_id, id).is_some();

    let mut changed = state.upsert_messages(&chat_id, [message.clone()]);
    if is_known {
        // Repeated delivery only refreshes the entity
        return changed;
    }

    changed |= state.update_thread(&chat_id, message.thread_id, |thread| {
        let appended = ranges::append_new_message(thread, id);
        if appended && message.thread_id != ThreadId::Main && !message.is_outgoing {
            thread.unread_count += 1;
        }
        appended
    });

    changed |= state.update_chat(&chat_id, |chat| {
        if chat.last_message_id.is_none_or(|last| last < id) {
            chat.last_message_id = Some(id);
            chat.last_message_at = Some(message.date);
        }
        if !message.is_outgoing && message.thread_id == ThreadId::Main {
            chat.unread_count += 1;
            if message.is_mentioned {
                chat.unread_mentions_count += 1;
            }
        }
    });
    changed
}

fn reduce_confirm_sent(
    state: &mut State,
    chat_id: &ChatId,
    local_id: MessageId,
    server_id: MessageId,
    date: DateTime<Utc>,
) -> bool {
    if state.message(chat_id, local_id).is_none() {
        warn!(
            "Confirmation for unknown local message {} in chat {}",
            local_id, chat_id
        );
        return false;
    }

    let mut changed = state.replace_message_id(chat_id, local_id, server_id);
    changed |= state.update_message(chat_id, server_id, |message| {
        message.send_state = SendState::Sent;
        message.date = date;
    });
    changed |= state.update_chat(chat_id, |chat| {
        if chat.last_message_id == Some(server_id) {
            chat.last_message_at = Some(date);
        }
    });
    changed
}

fn reduce_delete_messages(state: &mut State, chat_id: &ChatId, ids: &[MessageId]) -> bool {
    let (mut changed, removed) = state.delete_messages(chat_id, ids);
    if !changed {
        return false;
    }

    let newest = state
        .thread(chat_id, ThreadId::Main)
        .and_then(|thread| thread.last_message_id);
    let newest_at = newest
        .and_then(|id| state.message(chat_id, id))
        .map(|message| message.date);

    changed |= state.update_chat(chat_id, |chat| {
        let last_read = chat.last_read_inbox_id;
        for message in &removed {
            let was_unread = !message.is_outgoing
                && message.thread_id == ThreadId::Main
                && last_read.is_none_or(|read| message.id > read);
            if was_unread {
                chat.unread_count = chat.unread_count.saturating_sub(1);
                if message.is_mentioned {
                    chat.unread_mentions_count = chat.unread_mentions_count.saturating_sub(1);
                }
            }
        }
        if chat.last_message_id.is_some_and(|last| ids.contains(&last)) {
            chat.last_message_id = newest;
            chat.last_message_at = newest_at;
        }
    });
    changed
}

fn reduce_read_inbox(
    state: &mut State,
    chat_id: &ChatId,
    thread_id: ThreadId,
    max_id: MessageId,
    still_unread_count: u32,
) -> bool {
    if state.chat(chat_id).is_none() {
        warn!("Ignoring read update for unknown chat {}", chat_id);
        return false;
    }

    // The remaining count belongs to `max_id`; a stale read must not restore it
    let mut changed = state.update_thread(chat_id, thread_id, |thread| {
        if thread.last_read_inbox_id.is_some_and(|read| read >= max_id) {
            return false;
        }
        thread.last_read_inbox_id = Some(max_id);
        if thread_id != ThreadId::Main {
            thread.unread_count = still_unread_count;
        }
        true
    });

    if thread_id == ThreadId::Main {
        changed |= state.update_chat(chat_id, |chat| {
            if chat.last_read_inbox_id.is_some_and(|read| read >= max_id) {
                return;
            }
            chat.last_read_inbox_id = Some(max_id);
            chat.unread_count = still_unread_count;
            if still_unread_count == 0 {
                chat.unread_mentions_count = 0;
            }
            chat.is_marked_unread = false;
        });
    }
    changed
}

fn reduce_move_to_folder(state: &mut State, chat_id: &ChatId, folder_id: FolderId) -> bool {
    if state.chat(chat_id).is_none() {
        warn!("Ignoring folder move of unknown chat {}", chat_id);
        return false;
    }

    if folder_id == FolderId::ALL || folder_id == FolderId::ARCHIVED {
        return state.update_chat(chat_id, |chat| {
            if chat.folder_id != folder_id {
                chat.folder_id = folder_id;
                // Pin positions are per list
                chat.pinned_order = None;
            }
        });
    }

    let Some(folder) = state.folder(folder_id) else {
        warn!("Ignoring move of chat {} to unknown folder {}", chat_id, folder_id.0);
        return false;
    };
    let mut folder: ChatFolder = folder.clone();
    folder.excluded_chat_ids.retain(|id| id != chat_id);
    if !folder.included_chat_ids.contains(chat_id) {
        folder.included_chat_ids.push(chat_id.clone());
    }
    state.upsert_folder(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chat;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_test_message(chat: &str, id: u64) -> Message {
        Message::builder(ChatId::new(chat), MessageId::new(id))
            .text(format!("message {}", id))
            .date(at(id as i64))
            .build()
    }

    fn state_with_chat() -> State {
        let mut state = State::new();
        reduce(
            &mut state,
            &Action::UpsertChats {
                chats: vec![Chat::new("c1", "General")],
            },
        );
        state
    }

    fn c1() -> ChatId {
        ChatId::new("c1")
    }

    #[test]
    fn test_new_message_counts_unread() {
        let mut state = state_with_chat();
        let mut mention = make_test_message("c1", 1);
        mention.is_mentioned = true;

        assert!(reduce(&mut state, &Action::NewMessage { message: mention.clone() }));
        assert!(reduce(
            &mut state,
            &Action::NewMessage {
                message: make_test_message("c1", 2)
            }
        ));

        let chat = state.chat(&c1()).unwrap();
        assert_eq!(chat.unread_count, 2);
        assert_eq!(chat.unread_mentions_count, 1);
        assert_eq!(chat.last_message_id, Some(MessageId::new(2)));
        assert_eq!(
            state.thread(&c1(), ThreadId::Main).unwrap().listed_ids,
            vec![MessageId::new(1), MessageId::new(2)]
        );

        // Redelivery does not double count
        assert!(!reduce(&mut state, &Action::NewMessage { message: mention }));
        assert_eq!(state.chat(&c1()).unwrap().unread_count, 2);
    }

    #[test]
    fn test_send_then_confirm() {
        let mut state = state_with_chat();
        reduce(
            &mut state,
            &Action::NewMessage {
                message: make_test_message("c1", 5),
            },
        );

        let local = MessageId::local(5, 1);
        let outgoing = Message::builder(c1(), local).text("hi").date(at(6)).build();
        assert!(reduce(&mut state, &Action::SendMessageLocal { message: outgoing }));

        let pending = state.message(&c1(), local).unwrap();
        assert_eq!(pending.send_state, SendState::Pending);
        assert!(pending.is_outgoing);
        assert_eq!(state.chat(&c1()).unwrap().unread_count, 1);

        assert!(reduce(
            &mut state,
            &Action::ConfirmSentMessage {
                chat_id: c1(),
                local_id: local,
                server_id: MessageId::new(6),
                date: at(7),
            }
        ));

        let sent = state.message(&c1(), MessageId::new(6)).unwrap();
        assert_eq!(sent.send_state, SendState::Sent);
        assert_eq!(sent.date, at(7));
        let chat = state.chat(&c1()).unwrap();
        assert_eq!(chat.last_message_id, Some(MessageId::new(6)));
        assert_eq!(chat.last_message_at, Some(at(7)));
        assert_eq!(
            state.thread(&c1(), ThreadId::Main).unwrap().listed_ids,
            vec![MessageId::new(5), MessageId::new(6)]
        );
    }

    #[test]
    fn test_confirm_unknown_is_noop() {
        let mut state = state_with_chat();
        assert!(!reduce(
            &mut state,
            &Action::ConfirmSentMessage {
                chat_id: c1(),
                local_id: MessageId::local(1, 1),
                server_id: MessageId::new(2),
                date: at(0),
            }
        ));
    }

    #[test]
    fn test_delete_adjusts_unread_and_last_message() {
        let mut state = state_with_chat();
        for id in 1..=3 {
            reduce(
                &mut state,
                &Action::NewMessage {
                    message: make_test_message("c1", id),
                },
            );
        }

        assert!(reduce(
            &mut state,
            &Action::DeleteMessages {
                chat_id: c1(),
                ids: vec![MessageId::new(3)],
            }
        ));

        let chat = state.chat(&c1()).unwrap();
        assert_eq!(chat.unread_count, 2);
        assert_eq!(chat.last_message_id, Some(MessageId::new(2)));
        assert_eq!(chat.last_message_at, Some(at(2)));
    }

    #[test]
    fn test_read_inbox() {
        let mut state = state_with_chat();
        for id in 1..=3 {
            let mut message = make_test_message("c1", id);
            message.is_mentioned = id == 1;
            reduce(&mut state, &Action::NewMessage { message });
        }

        assert!(reduce(
            &mut state,
            &Action::UpdateReadInbox {
                chat_id: c1(),
                thread_id: ThreadId::Main,
                max_id: MessageId::new(3),
                still_unread_count: 0,
            }
        ));

        let chat = state.chat(&c1()).unwrap();
        assert_eq!(chat.unread_count, 0);
        assert_eq!(chat.unread_mentions_count, 0);
        assert_eq!(chat.last_read_inbox_id, Some(MessageId::new(3)));
        assert_eq!(
            state.thread(&c1(), ThreadId::Main).unwrap().last_read_inbox_id,
            Some(MessageId::new(3))
        );
    }

    #[test]
    fn test_stale_read_inbox_keeps_newer_count() {
        let mut state = state_with_chat();
        for id in 1..=4 {
            reduce(&mut state, &Action::NewMessage { message: make_test_message("c1", id) });
        }
        let read = |max_id: u64, still_unread_count| Action::UpdateReadInbox {
            chat_id: c1(),
            thread_id: ThreadId::Main,
            max_id: MessageId::new(max_id),
            still_unread_count,
        };

        assert!(reduce(&mut state, &read(4, 0)));
        // Arrives late, after the newer read
        assert!(!reduce(&mut state, &read(2, 2)));

        let chat = state.chat(&c1()).unwrap();
        assert_eq!(chat.unread_count, 0);
        assert_eq!(chat.last_read_inbox_id, Some(MessageId::new(4)));
    }

    #[test]
    fn test_noop_thread_actions_leave_state_untouched() {
        let mut state = state_with_chat();
        let before = state.clone();

        assert!(!reduce(
            &mut state,
            &Action::SetPinnedIds {
                chat_id: ChatId::new("ghost"),
                thread_id: ThreadId::Main,
                ids: Vec::new(),
                replace: false,
            }
        ));
        assert!(!reduce(
            &mut state,
            &Action::UpdateReadInbox {
                chat_id: ChatId::new("ghost"),
                thread_id: ThreadId::Main,
                max_id: MessageId::new(1),
                still_unread_count: 0,
            }
        ));
        assert!(!reduce(
            &mut state,
            &Action::AddHistorySlice {
                chat_id: c1(),
                thread_id: ThreadId::Topic(3),
                ids: Vec::new(),
                messages: Vec::new(),
                reached_latest: false,
                reached_start: false,
            }
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_history_slice_sets_first_message() {
        let mut state = state_with_chat();
        let messages: Vec<Message> = (1..=3).map(|id| make_test_message("c1", id)).collect();
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();

        assert!(reduce(
            &mut state,
            &Action::AddHistorySlice {
                chat_id: c1(),
                thread_id: ThreadId::Main,
                ids,
                messages,
                reached_latest: true,
                reached_start: true,
            }
        ));

        let thread = state.thread(&c1(), ThreadId::Main).unwrap();
        assert!(thread.has_reached_start());
        assert_eq!(thread.last_message_id, Some(MessageId::new(3)));
    }

    #[test]
    fn test_pinned_ids_merge_and_replace() {
        let mut state = state_with_chat();
        let pin = |ids: &[u64], replace| Action::SetPinnedIds {
            chat_id: c1(),
            thread_id: ThreadId::Main,
            ids: ids.iter().copied().map(MessageId::new).collect(),
            replace,
        };

        reduce(&mut state, &pin(&[3, 9], false));
        reduce(&mut state, &pin(&[5], false));
        assert_eq!(
            state.thread(&c1(), ThreadId::Main).unwrap().pinned_ids,
            vec![MessageId::new(9), MessageId::new(5), MessageId::new(3)]
        );

        reduce(&mut state, &pin(&[1], true));
        assert_eq!(
            state.thread(&c1(), ThreadId::Main).unwrap().pinned_ids,
            vec![MessageId::new(1)]
        );
    }

    #[test]
    fn test_move_to_archive_and_custom_folder() {
        let mut state = state_with_chat();
        reduce(&mut state, &Action::SetChatPinned { chat_id: c1(), pinned_order: Some(0) });

        assert!(reduce(
            &mut state,
            &Action::MoveChatToFolder {
                chat_id: c1(),
                folder_id: FolderId::ARCHIVED,
            }
        ));
        let chat = state.chat(&c1()).unwrap();
        assert!(chat.is_archived());
        assert_eq!(chat.pinned_order, None);

        // Unknown custom folder
        assert!(!reduce(
            &mut state,
            &Action::MoveChatToFolder {
                chat_id: c1(),
                folder_id: FolderId(9),
            }
        ));

        reduce(
            &mut state,
            &Action::UpsertFolder {
                folder: ChatFolder::new(FolderId(9), "Work"),
            },
        );
        assert!(reduce(
            &mut state,
            &Action::MoveChatToFolder {
                chat_id: c1(),
                folder_id: FolderId(9),
            }
        ));
        assert_eq!(state.folder(FolderId(9)).unwrap().included_chat_ids, vec![c1()]);
    }

    #[test]
    fn test_unchanged_actions_report_false() {
        let mut state = state_with_chat();
        assert!(!reduce(
            &mut state,
            &Action::UpsertChats {
                chats: vec![Chat::new("c1", "General")]
            }
        ));
        assert!(!reduce(
            &mut state,
            &Action::UpdateChat {
                chat_id: ChatId::new("missing"),
                patch: ChatPatch::default(),
            }
        ));
    }
}
