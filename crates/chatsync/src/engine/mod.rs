//! Per-tab engine
//!
//! `TabEngine` wires the pieces of one tab together: the store and folder
//! aggregates, the master election, the broadcast channel and the snapshot
//! cache. All inputs (ticks, envelopes, server updates, commands) are applied
//! synchronously; the caller supplies the clock.
//!
//! Only the master talks to the server. Whatever the master applies is
//! broadcast as one numbered delta, and followers apply the same actions in
//! sequence order. A follower that sees a gap stops applying deltas and asks
//! for a full state.

mod command;
mod simulated;
mod transport;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

pub use command::{Command, CommandOutcome, CommandTicket, TicketStatus};
pub use simulated::SimulatedTransport;
pub use transport::{HistoryRequest, HistorySlice, SentMessage, Transport, UpdateEvent};

use crate::broadcast::{
    BroadcastChannel, DeltaSequencer, DeltaTracker, Envelope, SeqDecision, StateSnapshot,
};
use crate::config::EngineConfig;
use crate::dispatch::{Action, Store};
use crate::error::{EngineError, Result, SnapshotError};
use crate::folders::FolderAggregator;
use crate::models::{ChatId, Message, MessageId, TabId, TabRole};
use crate::state::State;
use crate::storage::{PersistedSnapshot, SnapshotStore, load_snapshot, trim_state};
use crate::tabs::{RoleChange, SharedKv, Step, TabCoordinator};

/// Where this tab's state currently comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Waiting for a full state after opening
    Hydrating { since: i64 },
    /// Applying deltas in order
    Live,
    /// Running from the cached snapshot; deltas are applied from whatever
    /// sequence each origin is at
    CatchUp,
    /// A delta was lost; waiting for a fresh full state
    Resyncing { since: i64 },
}

impl SyncMode {
    fn is_waiting(&self) -> bool {
        matches!(self, SyncMode::Hydrating { .. } | SyncMode::Resyncing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationSource {
    Peer,
    Cache,
    Empty,
}

/// Things the embedding application may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RoleChanged(RoleChange),
    Hydrated { source: HydrationSource },
    ResyncRequested { origin: TabId },
    CommandFinished { request_id: u64, outcome: CommandOutcome },
    /// The master went away before answering; the caller may re-issue
    CommandAbandoned { request_id: u64, command: Command },
}

struct PendingCommand {
    command: Command,
    master: TabId,
}

/// A command forwarded to this tab by a peer
struct ForwardedCommand {
    origin: TabId,
    request_id: u64,
    command: Command,
}

pub struct TabEngine {
    tab_id: TabId,
    config: EngineConfig,
    channel: Box<dyn BroadcastChannel>,
    coordinator: TabCoordinator,
    snapshots: Arc<dyn SnapshotStore>,
    transport: Option<Box<dyn Transport>>,
    store: Store,
    folders: FolderAggregator,
    sequencer: DeltaSequencer,
    tracker: DeltaTracker,
    mode: SyncMode,
    last_request_ms: i64,
    next_request_id: u64,
    pending: BTreeMap<u64, PendingCommand>,
    queued: VecDeque<(u64, Command)>,
    /// Forwarded to us while our claim was settling
    held: Vec<ForwardedCommand>,
    events: Vec<EngineEvent>,
}

impl TabEngine {
    pub fn new(
        tab_id: TabId,
        config: EngineConfig,
        channel: Box<dyn BroadcastChannel>,
        kv: Arc<dyn SharedKv>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let coordinator = TabCoordinator::new(tab_id.clone(), kv, &config);
        Self {
            tab_id,
            config,
            channel,
            coordinator,
            snapshots,
            transport: None,
            store: Store::default(),
            folders: FolderAggregator::new(),
            sequencer: DeltaSequencer::new(),
            tracker: DeltaTracker::new(),
            mode: SyncMode::Hydrating { since: 0 },
            last_request_ms: 0,
            next_request_id: 1,
            pending: BTreeMap::new(),
            queued: VecDeque::new(),
            held: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Attach the network session, used only while this tab is master
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn role(&self) -> TabRole {
        self.coordinator.role()
    }

    pub fn is_master(&self) -> bool {
        self.coordinator.is_master()
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.mode
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<State> {
        self.store.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn folders(&self) -> &FolderAggregator {
        &self.folders
    }

    pub fn coordinator(&self) -> &TabCoordinator {
        &self.coordinator
    }

    /// Forwarded commands still waiting for the master's answer
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_commands(&self) -> usize {
        self.queued.len()
    }

    /// Take the events produced since the last call
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Ask the other tabs for their state and start the election
    pub fn open(&mut self, now_ms: i64) -> Result<()> {
        info!("Opening tab {}", self.tab_id);
        self.mode = SyncMode::Hydrating { since: now_ms };
        self.request_full_state(now_ms)?;
        let step = self.coordinator.start(now_ms);
        self.process_step(step, now_ms)
    }

    /// Process received envelopes and run every timer
    pub fn tick(&mut self, now_ms: i64) -> Result<()> {
        for envelope in self.channel.drain() {
            self.handle_envelope(envelope, now_ms)?;
        }

        let step = self.coordinator.tick(now_ms);
        self.process_step(step, now_ms)?;

        self.check_full_state_timeout(now_ms)?;
        self.abandon_orphaned_commands(now_ms);
        self.flush_queued(now_ms)
    }

    /// React to one envelope from another tab
    pub fn handle_envelope(&mut self, envelope: Envelope, now_ms: i64) -> Result<()> {
        if !envelope.is_for(&self.tab_id) {
            return Ok(());
        }

        match envelope {
            Envelope::Heartbeat { .. } | Envelope::MasterClaim { .. } => {
                let step = self.coordinator.handle(&envelope, now_ms);
                self.process_step(step, now_ms)?;
            }
            Envelope::FullStateRequest { requester_tab_id } => {
                if self.is_master() && !self.mode.is_waiting() {
                    debug!("Sending full state to {}", requester_tab_id);
                    self.channel.post(&Envelope::FullState {
                        target_tab_id: requester_tab_id,
                        payload: Box::new(StateSnapshot {
                            state: State::clone(self.store.state()),
                            watermarks: self.tracker.watermarks().clone(),
                        }),
                    })?;
                }
            }
            Envelope::FullState { payload, .. } => self.receive_full_state(*payload),
            Envelope::Delta {
                origin_tab_id,
                seq,
                payload,
            } => self.receive_delta(origin_tab_id, seq, payload, now_ms)?,
            Envelope::ForwardedCommand {
                origin_tab_id,
                request_id,
                command,
            } => {
                let forwarded = ForwardedCommand {
                    origin: origin_tab_id,
                    request_id,
                    command,
                };
                if self.is_master() {
                    self.answer_forwarded(forwarded, now_ms)?;
                } else if self.coordinator.is_settling() {
                    debug!(
                        "Holding {} from {} until the claim settles",
                        forwarded.command.kind(),
                        forwarded.origin
                    );
                    self.held.push(forwarded);
                }
            }
            Envelope::CommandResult {
                request_id, outcome, ..
            } => {
                if self.pending.remove(&request_id).is_some() {
                    self.events.push(EngineEvent::CommandFinished { request_id, outcome });
                }
            }
        }
        Ok(())
    }

    /// Apply a server update; master only
    ///
    /// Returns whether the state changed.
    pub fn apply_update(&mut self, update: UpdateEvent) -> Result<bool> {
        self.ensure_master()?;
        let applied = self.apply_and_broadcast(update.into_actions())?;
        Ok(!applied.is_empty())
    }

    /// Apply actions originating in this tab; master only
    pub fn dispatch(&mut self, actions: Vec<Action>) -> Result<bool> {
        self.ensure_master()?;
        let applied = self.apply_and_broadcast(actions)?;
        Ok(!applied.is_empty())
    }

    /// Run a command here if master, otherwise hand it to the master
    pub fn execute(&mut self, command: Command, now_ms: i64) -> Result<CommandTicket> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let status = match self.role() {
            TabRole::Master => match self.run_command(&command, now_ms) {
                Ok(()) => TicketStatus::Done(CommandOutcome::Completed),
                Err(EngineError::Transport(error)) => TicketStatus::Done(CommandOutcome::Failed { error }),
                Err(e) => return Err(e),
            },
            TabRole::Follower => match self.live_master(now_ms) {
                Some(master) => {
                    self.forward(request_id, command, master)?;
                    TicketStatus::Forwarded
                }
                None => self.enqueue(request_id, command),
            },
            TabRole::Unestablished => self.enqueue(request_id, command),
        };
        Ok(CommandTicket { request_id, status })
    }

    /// Persist the trimmed state; master only
    pub fn save_snapshot(&mut self, now_ms: i64) -> Result<()> {
        self.ensure_master()?;
        let trimmed = trim_state(self.store.state(), &self.config);
        let chats = trimmed.chats.len();
        let bytes = PersistedSnapshot::new(trimmed, timestamp(now_ms)).encode()?;
        self.snapshots.save(&bytes).map_err(SnapshotError::Storage)?;
        info!("Saved snapshot: {} chats, {} bytes", chats, bytes.len());
        Ok(())
    }

    /// Close the tab, saving the cache and releasing the claim if master
    pub fn close(&mut self, now_ms: i64) {
        if self.is_master()
            && let Err(e) = self.save_snapshot(now_ms)
        {
            warn!("Failed to save snapshot on close: {}", e);
        }
        if let Some(change) = self.coordinator.close() {
            self.events.push(EngineEvent::RoleChanged(change));
        }
        info!("Closed tab {}", self.tab_id);
    }

    fn ensure_master(&self) -> Result<()> {
        if self.is_master() {
            Ok(())
        } else {
            Err(EngineError::NotMaster(self.tab_id.clone()))
        }
    }

    fn live_master(&self, now_ms: i64) -> Option<TabId> {
        self.coordinator
            .current_master(now_ms)
            .filter(|master| *master != self.tab_id)
    }

    fn process_step(&mut self, step: Step, now_ms: i64) -> Result<()> {
        for envelope in &step.envelopes {
            self.channel.post(envelope)?;
        }
        if let Some(change) = step.role_change {
            self.events.push(EngineEvent::RoleChanged(change));
            if change.to == TabRole::Master {
                self.on_became_master();
            }
        }

        // Settled one way or the other
        if !self.coordinator.is_settling() && !self.held.is_empty() {
            let held = std::mem::take(&mut self.held);
            if self.is_master() {
                for forwarded in held {
                    self.answer_forwarded(forwarded, now_ms)?;
                }
            } else {
                // Senders see the claim moved and abandon these
                debug!("Dropping {} held commands, claim lost", held.len());
            }
        }
        Ok(())
    }

    /// A new master has nobody to hydrate from and nobody to forward to
    fn on_became_master(&mut self) {
        if matches!(self.mode, SyncMode::Hydrating { .. }) {
            self.hydrate_from_cache();
        }
        self.mode = SyncMode::Live;
        self.abandon_all_pending();
    }

    fn answer_forwarded(&mut self, forwarded: ForwardedCommand, now_ms: i64) -> Result<()> {
        debug!(
            "Running {} forwarded by {}",
            forwarded.command.kind(),
            forwarded.origin
        );
        let outcome = self.run_to_outcome(&forwarded.command, now_ms);
        self.channel.post(&Envelope::CommandResult {
            target_tab_id: forwarded.origin,
            request_id: forwarded.request_id,
            outcome,
        })?;
        Ok(())
    }

    /// Store, aggregate and report actions without broadcasting them
    fn commit(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let applied = self.store.dispatch_changes(actions);
        if !applied.is_empty() {
            let scopes: Vec<_> = applied.iter().map(Action::scope).collect();
            self.folders.apply_all(self.store.state(), &scopes);
        }
        applied
    }

    fn apply_and_broadcast(&mut self, actions: Vec<Action>) -> Result<Vec<Action>> {
        let applied = self.commit(actions);
        if !applied.is_empty() && self.is_master() {
            let seq = self.sequencer.next_seq();
            self.tracker.record_own(&self.tab_id, seq);
            self.channel.post(&Envelope::Delta {
                origin_tab_id: self.tab_id.clone(),
                seq,
                payload: applied.clone(),
            })?;
        }
        Ok(applied)
    }

    fn request_full_state(&mut self, now_ms: i64) -> Result<()> {
        self.last_request_ms = now_ms;
        self.channel.post(&Envelope::FullStateRequest {
            requester_tab_id: self.tab_id.clone(),
        })?;
        Ok(())
    }

    fn receive_full_state(&mut self, snapshot: StateSnapshot) {
        if self.is_master() {
            return;
        }
        if self.mode == SyncMode::Live {
            debug!("Ignoring full state, already live");
            return;
        }

        info!(
            "Tab {} hydrated from peer: {} chats",
            self.tab_id,
            snapshot.state.chats.len()
        );
        self.commit(vec![Action::ReplaceState {
            state: Box::new(snapshot.state),
        }]);
        self.tracker.reset(snapshot.watermarks);
        self.mode = SyncMode::Live;
        self.events.push(EngineEvent::Hydrated {
            source: HydrationSource::Peer,
        });
    }

    fn receive_delta(&mut self, origin: TabId, seq: u64, actions: Vec<Action>, now_ms: i64) -> Result<()> {
        if origin == self.tab_id {
            return Ok(());
        }
        if self.mode.is_waiting() {
            debug!("Dropping delta {}#{} while waiting for full state", origin, seq);
            return Ok(());
        }

        match self.tracker.observe(&origin, seq) {
            SeqDecision::Apply => {
                if let Some(chat_id) = missing_chat(self.store.state(), &actions) {
                    warn!("Delta {}#{} references unknown chat {}", origin, seq, chat_id);
                    return self.start_resync(origin, now_ms);
                }
                self.commit(actions);
                Ok(())
            }
            SeqDecision::Duplicate => {
                debug!("Duplicate delta {}#{}", origin, seq);
                Ok(())
            }
            SeqDecision::Gap { expected, got } => {
                warn!("Delta gap from {}: expected {}, got {}", origin, expected, got);
                self.start_resync(origin, now_ms)
            }
        }
    }

    fn start_resync(&mut self, origin: TabId, now_ms: i64) -> Result<()> {
        self.mode = SyncMode::Resyncing { since: now_ms };
        self.events.push(EngineEvent::ResyncRequested { origin });
        self.request_full_state(now_ms)
    }

    fn hydrate_from_cache(&mut self) {
        let source = match load_snapshot(self.snapshots.as_ref()) {
            Some(snapshot) => {
                info!(
                    "Tab {} hydrated from cache saved at {}",
                    self.tab_id, snapshot.saved_at
                );
                self.commit(vec![Action::ReplaceState {
                    state: Box::new(snapshot.state),
                }]);
                HydrationSource::Cache
            }
            None => {
                info!("Tab {} starting with empty state", self.tab_id);
                HydrationSource::Empty
            }
        };
        self.events.push(EngineEvent::Hydrated { source });
    }

    fn check_full_state_timeout(&mut self, now_ms: i64) -> Result<()> {
        let (since, hydrating) = match self.mode {
            SyncMode::Hydrating { since } => (since, true),
            SyncMode::Resyncing { since } => (since, false),
            SyncMode::Live | SyncMode::CatchUp => return Ok(()),
        };

        if now_ms - since >= self.config.full_state_timeout_ms {
            warn!("Tab {}: no full state after {}ms, catching up", self.tab_id, now_ms - since);
            if hydrating {
                self.hydrate_from_cache();
            }
            self.tracker.reset(Default::default());
            self.tracker.adopt_unknown_origins();
            self.mode = SyncMode::CatchUp;
        } else if now_ms - self.last_request_ms >= self.config.heartbeat_interval_ms {
            self.request_full_state(now_ms)?;
        }
        Ok(())
    }

    fn abandon_orphaned_commands(&mut self, now_ms: i64) {
        let master = self.live_master(now_ms);
        let orphaned: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, pending)| Some(&pending.master) != master.as_ref())
            .map(|(request_id, _)| *request_id)
            .collect();
        for request_id in orphaned {
            self.abandon(request_id);
        }
    }

    fn abandon_all_pending(&mut self) {
        let request_ids: Vec<u64> = self.pending.keys().copied().collect();
        for request_id in request_ids {
            self.abandon(request_id);
        }
    }

    fn abandon(&mut self, request_id: u64) {
        if let Some(pending) = self.pending.remove(&request_id) {
            warn!(
                "Abandoning {} #{}: master {} is gone",
                pending.command.kind(),
                request_id,
                pending.master
            );
            self.events.push(EngineEvent::CommandAbandoned {
                request_id,
                command: pending.command,
            });
        }
    }

    fn enqueue(&mut self, request_id: u64, command: Command) -> TicketStatus {
        debug!("Queueing {} #{} until a master exists", command.kind(), request_id);
        self.queued.push_back((request_id, command));
        TicketStatus::Queued
    }

    fn forward(&mut self, request_id: u64, command: Command, master: TabId) -> Result<()> {
        self.channel.post(&Envelope::ForwardedCommand {
            origin_tab_id: self.tab_id.clone(),
            request_id,
            command: command.clone(),
        })?;
        self.pending.insert(request_id, PendingCommand { command, master });
        Ok(())
    }

    fn flush_queued(&mut self, now_ms: i64) -> Result<()> {
        while let Some((request_id, command)) = self.queued.pop_front() {
            match self.role() {
                TabRole::Master => {
                    let outcome = self.run_to_outcome(&command, now_ms);
                    self.events.push(EngineEvent::CommandFinished { request_id, outcome });
                }
                TabRole::Follower => match self.live_master(now_ms) {
                    Some(master) => self.forward(request_id, command, master)?,
                    None => {
                        self.queued.push_front((request_id, command));
                        break;
                    }
                },
                TabRole::Unestablished => {
                    self.queued.push_front((request_id, command));
                    break;
                }
            }
        }
        Ok(())
    }

    /// Run a command for a caller that only wants to know how it went
    fn run_to_outcome(&mut self, command: &Command, now_ms: i64) -> CommandOutcome {
        match self.run_command(command, now_ms) {
            Ok(()) => CommandOutcome::Completed,
            Err(EngineError::Transport(error)) => CommandOutcome::Failed { error },
            Err(e) => CommandOutcome::Invalid { reason: e.to_string() },
        }
    }

    /// Run a command against the server and apply its result
    fn run_command(&mut self, command: &Command, now_ms: i64) -> Result<()> {
        let chat_id = command.chat_id();
        if self.store.state().chat(chat_id).is_none() {
            return Err(EngineError::UnknownChat(chat_id.clone()));
        }
        if self.transport.is_none() {
            return Err(EngineError::NoTransport(self.tab_id.clone()));
        }
        debug!("Running {} for chat {}", command.kind(), chat_id);

        match command {
            Command::SendMessage {
                chat_id,
                thread_id,
                text,
            } => {
                let local_id = self.next_local_id(chat_id);
                let message = Message::builder(chat_id.clone(), local_id)
                    .thread(*thread_id)
                    .text(text.clone())
                    .date(timestamp(now_ms))
                    .outgoing(true)
                    .build();
                self.apply_and_broadcast(vec![Action::SendMessageLocal { message }])?;

                match self.transport_mut()?.send_message(chat_id, *thread_id, text) {
                    Ok(sent) => {
                        self.apply_and_broadcast(vec![Action::ConfirmSentMessage {
                            chat_id: chat_id.clone(),
                            local_id,
                            server_id: sent.id,
                            date: sent.date,
                        }])?;
                    }
                    Err(error) => {
                        warn!("Sending to {} failed: {}", chat_id, error);
                        self.apply_and_broadcast(vec![Action::MarkMessageFailed {
                            chat_id: chat_id.clone(),
                            message_id: local_id,
                        }])?;
                        return Err(error.into());
                    }
                }
            }
            Command::FetchHistory {
                chat_id,
                thread_id,
                anchor,
                direction,
                limit,
            } => {
                let request = HistoryRequest {
                    chat_id: chat_id.clone(),
                    thread_id: *thread_id,
                    anchor: *anchor,
                    direction: *direction,
                    limit: *limit,
                };
                let slice = self.transport_mut()?.fetch_history(&request)?;
                self.apply_and_broadcast(vec![Action::AddHistorySlice {
                    chat_id: chat_id.clone(),
                    thread_id: *thread_id,
                    ids: slice.ids,
                    messages: slice.messages,
                    reached_latest: slice.reached_latest,
                    reached_start: slice.reached_start,
                }])?;
            }
            Command::MarkRead {
                chat_id,
                thread_id,
                max_id,
            } => {
                let still_unread_count = self.transport_mut()?.mark_read(chat_id, *thread_id, *max_id)?;
                self.apply_and_broadcast(vec![Action::UpdateReadInbox {
                    chat_id: chat_id.clone(),
                    thread_id: *thread_id,
                    max_id: *max_id,
                    still_unread_count,
                }])?;
            }
            Command::DeleteMessages { chat_id, ids } => {
                self.transport_mut()?.delete_messages(chat_id, ids)?;
                self.apply_and_broadcast(vec![Action::DeleteMessages {
                    chat_id: chat_id.clone(),
                    ids: ids.clone(),
                }])?;
            }
            Command::EditMessage {
                chat_id,
                message_id,
                text,
            } => {
                let edited_at = self.transport_mut()?.edit_message(chat_id, *message_id, text)?;
                self.apply_and_broadcast(vec![Action::EditMessage {
                    chat_id: chat_id.clone(),
                    message_id: *message_id,
                    text: text.clone(),
                    edited_at,
                }])?;
            }
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport
            .as_mut()
            .ok_or_else(|| EngineError::NoTransport(self.tab_id.clone()))
    }

    fn next_local_id(&self, chat_id: &ChatId) -> MessageId {
        next_local_id(self.store.state(), chat_id)
    }
}

fn timestamp(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_default()
}

/// Local ids sort right after the newest server id known in the chat
///
/// The sequence continues from the local ids already stored under that
/// server id, so it survives a hand-off or a reload from the cache.
fn next_local_id(state: &State, chat_id: &ChatId) -> MessageId {
    let after = state
        .chat(chat_id)
        .and_then(|chat| chat.last_message_id)
        .map_or(0, |id| id.server);
    let seq = state
        .chat_messages(chat_id)
        .map(|messages| {
            messages
                .by_id
                .keys()
                .filter(|id| id.server == after)
                .map(|id| id.local)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    MessageId::local(after, seq + 1)
}

/// A chat an action expects to exist but this state does not have
///
/// Chats created by an earlier action of the same batch count as present.
fn missing_chat<'a>(state: &State, actions: &'a [Action]) -> Option<&'a ChatId> {
    let mut created: HashSet<&ChatId> = HashSet::new();
    actions.iter().find_map(|action| {
        let chat_id = match action {
            Action::UpsertChats { chats } => {
                created.extend(chats.iter().map(|chat| &chat.id));
                return None;
            }
            Action::UpdateChat { chat_id, .. }
            | Action::ConfirmSentMessage { chat_id, .. }
            | Action::MarkMessageFailed { chat_id, .. }
            | Action::EditMessage { chat_id, .. }
            | Action::UpdateReadInbox { chat_id, .. }
            | Action::UpdateReadOutbox { chat_id, .. }
            | Action::MoveChatToFolder { chat_id, .. }
            | Action::SetChatPinned { chat_id, .. } => chat_id,
            _ => return None,
        };
        (state.chat(chat_id).is_none() && !created.contains(chat_id)).then_some(chat_id)
    })
}
