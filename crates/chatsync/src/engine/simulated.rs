//! In-process stand-in for the messaging server
//!
//! Holds per-chat histories and assigns server ids. Used by the tab
//! simulator and by tests; clones share the same server.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use super::transport::{HistoryRequest, HistorySlice, SentMessage, Transport};
use crate::error::TransportError;
use crate::models::{ChatId, Message, MessageId, ThreadId, UserId};
use crate::ranges::Direction;

#[derive(Default)]
struct Server {
    histories: HashMap<ChatId, Vec<Message>>,
    failures: VecDeque<TransportError>,
    calls: usize,
}

impl Server {
    fn history(&self, chat_id: &ChatId) -> &[Message] {
        self.histories.get(chat_id).map(Vec::as_slice).unwrap_or_default()
    }

    fn next_id(&self, chat_id: &ChatId) -> MessageId {
        self.history(chat_id)
            .last()
            .map_or(MessageId::new(1), |message| message.id.successor())
    }

    fn next_date(&self, chat_id: &ChatId) -> DateTime<Utc> {
        self.history(chat_id)
            .last()
            .map_or_else(Utc::now, |message| message.date + Duration::seconds(1))
    }

    /// Count the call and fail it if a failure is scheduled
    fn begin(&mut self) -> Result<(), TransportError> {
        self.calls += 1;
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct SimulatedTransport {
    inner: Arc<Mutex<Server>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Server> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace a chat's server-side history
    pub fn seed(&self, chat_id: &ChatId, mut messages: Vec<Message>) {
        messages.sort_by_key(|message| message.id);
        self.lock().histories.insert(chat_id.clone(), messages);
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: TransportError) {
        self.lock().failures.push_back(error);
    }

    /// Number of requests served, failed ones included
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Someone else posts in a chat; returns the stored message
    pub fn receive(&self, chat_id: &ChatId, sender: &UserId, text: &str) -> Message {
        let mut server = self.lock();
        let message = Message::builder(chat_id.clone(), server.next_id(chat_id))
            .sender(sender.clone())
            .text(text)
            .date(server.next_date(chat_id))
            .build();
        server
            .histories
            .entry(chat_id.clone())
            .or_default()
            .push(message.clone());
        message
    }

    pub fn history(&self, chat_id: &ChatId) -> Vec<Message> {
        self.lock().history(chat_id).to_vec()
    }
}

impl Transport for SimulatedTransport {
    fn fetch_history(&mut self, request: &HistoryRequest) -> Result<HistorySlice, TransportError> {
        let mut server = self.lock();
        server.begin()?;

        let thread: Vec<&Message> = server
            .history(&request.chat_id)
            .iter()
            .filter(|message| message.thread_id == request.thread_id)
            .collect();
        let limit = request.limit.max(1);
        let (start, end) = match request.anchor {
            None => (thread.len().saturating_sub(limit), thread.len()),
            Some(anchor) => {
                let index = thread.partition_point(|message| message.id < anchor);
                match request.direction {
                    Direction::Backwards => {
                        let end = thread.len().min(index + 1);
                        (end.saturating_sub(limit), end)
                    }
                    Direction::Forwards => (index, thread.len().min(index + limit)),
                    Direction::Around => {
                        let start = index.saturating_sub(limit / 2);
                        (start, thread.len().min(start + limit))
                    }
                }
            }
        };

        let messages: Vec<Message> = thread[start..end].iter().map(|m| (*m).clone()).collect();
        Ok(HistorySlice {
            ids: messages.iter().map(|message| message.id).collect(),
            messages,
            reached_latest: end == thread.len(),
            reached_start: start == 0,
        })
    }

    fn send_message(
        &mut self,
        chat_id: &ChatId,
        thread_id: ThreadId,
        text: &str,
    ) -> Result<SentMessage, TransportError> {
        let mut server = self.lock();
        server.begin()?;

        let message = Message::builder(chat_id.clone(), server.next_id(chat_id))
            .thread(thread_id)
            .text(text)
            .date(server.next_date(chat_id))
            .outgoing(true)
            .build();
        let sent = SentMessage {
            id: message.id,
            date: message.date,
        };
        server.histories.entry(chat_id.clone()).or_default().push(message);
        Ok(sent)
    }

    fn mark_read(
        &mut self,
        chat_id: &ChatId,
        thread_id: ThreadId,
        max_id: MessageId,
    ) -> Result<u32, TransportError> {
        let mut server = self.lock();
        server.begin()?;

        let still_unread = server
            .history(chat_id)
            .iter()
            .filter(|message| message.thread_id == thread_id && !message.is_outgoing && message.id > max_id)
            .count();
        Ok(still_unread as u32)
    }

    fn delete_messages(&mut self, chat_id: &ChatId, ids: &[MessageId]) -> Result<(), TransportError> {
        let mut server = self.lock();
        server.begin()?;

        if let Some(history) = server.histories.get_mut(chat_id) {
            history.retain(|message| !ids.contains(&message.id));
        }
        Ok(())
    }

    fn edit_message(
        &mut self,
        chat_id: &ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<DateTime<Utc>, TransportError> {
        let mut server = self.lock();
        server.begin()?;

        let edited_at = server.next_date(chat_id);
        let message = server
            .histories
            .get_mut(chat_id)
            .and_then(|history| history.iter_mut().find(|message| message.id == message_id))
            .ok_or_else(|| TransportError::Rejected("MESSAGE_ID_INVALID".to_string()))?;
        message.text = text.to_string();
        message.edited_at = Some(edited_at);
        Ok(edited_at)
    }
}
