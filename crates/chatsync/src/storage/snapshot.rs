//! Versioned snapshot encoding and cache trimming

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::SnapshotStore;
use crate::config::EngineConfig;
use crate::error::SnapshotError;
use crate::models::{Chat, ChatId, UserId};
use crate::state::State;

/// Bumped whenever the persisted shape of `State` changes incompatibly
pub const SNAPSHOT_VERSION: u32 = 1;

/// The persisted form of a tab's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: State,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl PersistedSnapshot {
    pub fn new(state: State, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            state,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        serde_json::to_vec(self).map_err(|e| SnapshotError::Storage(e.into()))
    }

    /// Parse a stored snapshot, checking the version before the body
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let probe: VersionProbe =
            serde_json::from_slice(bytes).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        if probe.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: probe.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        serde_json::from_slice(bytes).map_err(|e| SnapshotError::Corrupt(e.to_string()))
    }
}

/// Load the cached state, discarding anything unreadable
///
/// A corrupt or outdated snapshot is cleared so the next cold start does not
/// trip over it again.
pub fn load_snapshot(store: &dyn SnapshotStore) -> Option<PersistedSnapshot> {
    let bytes = match store.load() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read snapshot: {:#}", e);
            return None;
        }
    };

    match PersistedSnapshot::decode(&bytes) {
        Ok(snapshot) => {
            debug!(
                "Loaded snapshot from {} ({} chats)",
                snapshot.saved_at,
                snapshot.state.chats.len()
            );
            Some(snapshot)
        }
        Err(e) => {
            warn!("Discarding snapshot: {}", e);
            if let Err(e) = store.clear() {
                warn!("Failed to clear snapshot: {:#}", e);
            }
            None
        }
    }
}

fn recency(chat: &Chat) -> (u32, Reverse<i64>, &ChatId) {
    (
        chat.pinned_order.unwrap_or(u32::MAX),
        Reverse(chat.last_message_at.map(|at| at.timestamp_millis()).unwrap_or(i64::MIN)),
        &chat.id,
    )
}

/// Cut a state down to the configured cache limits
///
/// Keeps the first `chat_list_limit` chats of the main list and the first
/// `archived_chat_list_limit` archived chats (pinned first, then most
/// recent). Messages of dropped chats go with them. Users referenced by kept
/// messages are preferred when choosing which users to keep.
pub fn trim_state(state: &State, config: &EngineConfig) -> State {
    let mut main: Vec<&Chat> = Vec::new();
    let mut archived: Vec<&Chat> = Vec::new();
    for chat in state.chats.values() {
        if chat.is_archived() {
            archived.push(chat);
        } else {
            main.push(chat);
        }
    }
    main.sort_by(|a, b| recency(a).cmp(&recency(b)));
    archived.sort_by(|a, b| recency(a).cmp(&recency(b)));

    let kept: HashSet<&ChatId> = main
        .iter()
        .take(config.chat_list_limit)
        .chain(archived.iter().take(config.archived_chat_list_limit))
        .map(|chat| &chat.id)
        .collect();

    let chats: HashMap<ChatId, Arc<Chat>> = state
        .chats
        .iter()
        .filter(|(id, _)| kept.contains(id))
        .map(|(id, chat)| (id.clone(), Arc::clone(chat)))
        .collect();

    let messages: HashMap<_, _> = state
        .messages
        .iter()
        .filter(|(id, _)| kept.contains(id))
        .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
        .collect();

    let senders: HashSet<&UserId> = messages
        .values()
        .flat_map(|entry| entry.by_id.values())
        .filter_map(|message| message.sender_id.as_ref())
        .collect();
    let mut user_ids: Vec<&UserId> = state.users.keys().collect();
    user_ids.sort_by_key(|id| (!senders.contains(id), *id));
    let users: HashMap<_, _> = user_ids
        .into_iter()
        .take(config.user_list_limit)
        .map(|id| (id.clone(), Arc::clone(&state.users[id])))
        .collect();

    let mut emoji_ids: Vec<&String> = state.custom_emojis.keys().collect();
    emoji_ids.sort();
    let custom_emojis: HashMap<_, _> = emoji_ids
        .into_iter()
        .take(config.custom_emoji_limit)
        .map(|id| (id.clone(), Arc::clone(&state.custom_emojis[id])))
        .collect();

    let dropped = state.chats.len() - chats.len();
    if dropped > 0 {
        info!("Trimmed {} chats from snapshot", dropped);
    }

    State {
        chats: Arc::new(chats),
        messages: Arc::new(messages),
        users: Arc::new(users),
        custom_emojis: Arc::new(custom_emojis),
        chat_folders: Arc::clone(&state.chat_folders),
        last_sync_at: state.last_sync_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomEmoji, Message, MessageId, User};
    use crate::storage::InMemorySnapshotStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_test_state(main: usize, archived: usize) -> State {
        let mut state = State::new();
        for i in 0..main {
            state.upsert_chat(
                Chat::new(format!("m{}", i), "Main").with_last_message(MessageId::new(1), at(i as i64)),
            );
        }
        for i in 0..archived {
            state.upsert_chat(
                Chat::new(format!("a{}", i), "Archived")
                    .archived()
                    .with_last_message(MessageId::new(1), at(i as i64)),
            );
        }
        state
    }

    fn small_limits() -> EngineConfig {
        EngineConfig {
            chat_list_limit: 3,
            archived_chat_list_limit: 1,
            user_list_limit: 2,
            custom_emoji_limit: 1,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_encode_decode() {
        let state = make_test_state(2, 1);
        let snapshot = PersistedSnapshot::new(state, at(0));
        let bytes = snapshot.encode().unwrap();
        assert_eq!(PersistedSnapshot::decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_rejects_other_version() {
        let bytes = br#"{ "version": 99, "saved_at": "2024-01-01T00:00:00Z", "state": {} }"#;
        match PersistedSnapshot::decode(bytes) {
            Err(SnapshotError::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, SNAPSHOT_VERSION);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_snapshot_is_discarded() {
        let store = InMemorySnapshotStore::new();
        store.save(b"{ not json").unwrap();

        assert!(load_snapshot(&store).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_snapshot() {
        let store = InMemorySnapshotStore::new();
        assert!(load_snapshot(&store).is_none());

        let snapshot = PersistedSnapshot::new(make_test_state(1, 0), at(5));
        store.save(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(load_snapshot(&store), Some(snapshot));
    }

    #[test]
    fn test_trim_keeps_most_recent_and_pinned() {
        let mut state = make_test_state(6, 3);
        state.update_chat(&ChatId::new("m0"), |chat| chat.pinned_order = Some(0));

        let trimmed = trim_state(&state, &small_limits());

        let mut ids: Vec<&str> = trimmed.chats.keys().map(ChatId::as_str).collect();
        ids.sort();
        assert_eq!(ids, vec!["a2", "m0", "m4", "m5"]);
    }

    #[test]
    fn test_trim_drops_messages_and_prefers_senders() {
        let mut state = make_test_state(2, 0);
        let limits = EngineConfig {
            chat_list_limit: 1,
            ..small_limits()
        };
        for chat in ["m0", "m1"] {
            let message = Message::builder(ChatId::new(chat), MessageId::new(1))
                .sender(format!("u-{}", chat).as_str())
                .date(at(0))
                .build();
            state.upsert_messages(&ChatId::new(chat), [message]);
        }
        state.upsert_users(["a", "b", "u-m1"].map(|id| User::new(id, id)));
        state.upsert_custom_emojis(["e2", "e1"].map(|id| CustomEmoji {
            id: id.to_string(),
            alt: ":)".to_string(),
            sticker_set_id: None,
        }));

        let trimmed = trim_state(&state, &limits);

        assert!(trimmed.chat_messages(&ChatId::new("m1")).is_some());
        assert!(trimmed.chat_messages(&ChatId::new("m0")).is_none());
        assert!(trimmed.user(&UserId::new("u-m1")).is_some());
        assert!(trimmed.user(&UserId::new("a")).is_some());
        assert_eq!(trimmed.users.len(), 2);
        assert!(trimmed.custom_emojis.contains_key("e1"));
        assert_eq!(trimmed.custom_emojis.len(), 1);
    }
}
