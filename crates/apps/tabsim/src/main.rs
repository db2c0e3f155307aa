//! Tabsim - Runs several tabs of one chat session in-process
//!
//! The tabs share a broadcast hub, a key/value store, a snapshot cache and a
//! simulated server. A simulated clock drives them through election, live
//! traffic, a master crash and a hand-off, then checks that every tab ended
//! up with the same state.
//!
//! Usage: `tabsim [TAB_COUNT]` (default 3)

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chatsync::engine::{Command, EngineEvent, TicketStatus, UpdateEvent};
use chatsync::ranges::Direction;
use chatsync::{
    Action, Chat, ChatId, EngineConfig, FolderId, InMemoryHub, InMemoryKv, SimulatedTransport,
    SnapshotStore, SqliteSnapshotStore, TabEngine, TabId, ThreadId, UserId, query,
};
use log::{error, info, warn};

const SNAPSHOT_DB: &str = "tabsim-snapshots.db";
const STEP_MS: i64 = 100;

struct Simulation {
    config: EngineConfig,
    hub: InMemoryHub,
    kv: InMemoryKv,
    snapshots: Arc<dyn SnapshotStore>,
    server: SimulatedTransport,
    tabs: Vec<TabEngine>,
    now_ms: i64,
}

impl Simulation {
    fn new(config: EngineConfig, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            config,
            hub: InMemoryHub::new(),
            kv: InMemoryKv::new(),
            snapshots,
            server: SimulatedTransport::new(),
            tabs: Vec::new(),
            now_ms: 0,
        }
    }

    fn open_tab(&mut self, name: &str) -> Result<()> {
        let mut tab = TabEngine::new(
            TabId::new(name),
            self.config.clone(),
            Box::new(self.hub.connect()),
            Arc::new(self.kv.clone()),
            self.snapshots.clone(),
        )
        .with_transport(Box::new(self.server.clone()));
        tab.open(self.now_ms)?;
        self.tabs.push(tab);
        Ok(())
    }

    /// Advance the clock, ticking every tab each step
    fn advance(&mut self, duration_ms: i64) -> Result<()> {
        let until = self.now_ms + duration_ms;
        while self.now_ms < until {
            self.now_ms += STEP_MS;
            for tab in &mut self.tabs {
                tab.tick(self.now_ms)?;
            }
            self.report_events();
        }
        Ok(())
    }

    fn report_events(&mut self) {
        for tab in &mut self.tabs {
            for event in tab.take_events() {
                match event {
                    EngineEvent::RoleChanged(change) => info!(
                        "[{:>6}ms] tab {}: {:?} -> {:?}",
                        self.now_ms,
                        tab.tab_id(),
                        change.from,
                        change.to
                    ),
                    EngineEvent::Hydrated { source } => {
                        info!("[{:>6}ms] tab {}: hydrated from {:?}", self.now_ms, tab.tab_id(), source)
                    }
                    EngineEvent::ResyncRequested { origin } => {
                        warn!("[{:>6}ms] tab {}: resync after loss from {}", self.now_ms, tab.tab_id(), origin)
                    }
                    EngineEvent::CommandFinished { request_id, outcome } => info!(
                        "[{:>6}ms] tab {}: command #{} finished: {:?}",
                        self.now_ms,
                        tab.tab_id(),
                        request_id,
                        outcome
                    ),
                    EngineEvent::CommandAbandoned { request_id, command } => warn!(
                        "[{:>6}ms] tab {}: command #{} ({}) abandoned",
                        self.now_ms,
                        tab.tab_id(),
                        request_id,
                        command.kind()
                    ),
                }
            }
        }
    }

    fn master_index(&self) -> Option<usize> {
        self.tabs.iter().position(TabEngine::is_master)
    }

    fn master(&mut self) -> Result<&mut TabEngine> {
        let index = self.master_index().context("No master tab")?;
        Ok(&mut self.tabs[index])
    }

    fn follower(&mut self) -> Result<&mut TabEngine> {
        self.tabs
            .iter_mut()
            .find(|tab| !tab.is_master())
            .context("No follower tab")
    }

    /// Every tab must hold the master's state
    fn check_convergence(&self) -> Result<()> {
        let masters = self.tabs.iter().filter(|tab| tab.is_master()).count();
        if masters != 1 {
            bail!("Expected one master, found {}", masters);
        }
        let index = self.master_index().context("No master tab")?;
        let reference = self.tabs[index].state();
        for tab in &self.tabs {
            if tab.state().as_ref() != reference.as_ref() {
                bail!("Tab {} diverged from the master", tab.tab_id());
            }
        }

        let folders = self.tabs[index].folders();
        for folder_id in [FolderId::ALL, FolderId::ARCHIVED] {
            let counters = query::folder_unread_counters(folders, folder_id);
            info!(
                "Folder {}: {} chats, {} unread chats, {} unread messages",
                folder_id.0,
                query::folder_ordered_ids(folders, folder_id).len(),
                counters.chats_count,
                counters.messages_count
            );
        }
        info!("{} tabs converged at {}ms", self.tabs.len(), self.now_ms);
        Ok(())
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    if let Err(e) = run() {
        error!("Simulation failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let tab_count: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse().with_context(|| format!("Invalid tab count: {}", arg))?,
        None => 3,
    };
    if tab_count < 2 {
        bail!("Need at least two tabs to hand off mastership");
    }

    let config = EngineConfig::load().unwrap_or_else(|e| {
        warn!("Using default engine config: {:#}", e);
        EngineConfig::default()
    });
    let mut sim = Simulation::new(config.clone(), open_snapshots(&config)?);

    let general = ChatId::new("general");
    let alice = UserId::new("alice");
    for i in 0..120 {
        sim.server.receive(&general, &alice, &format!("backlog {}", i));
    }

    // Election and hydration
    for i in 0..tab_count {
        sim.open_tab(&format!("tab-{}", i + 1))?;
    }
    sim.advance(2 * config.heartbeat_interval_ms)?;

    // The master learns the chat list
    sim.master()?.dispatch(vec![Action::UpsertChats {
        chats: vec![
            Chat::new("general", "General"),
            Chat::new("random", "Random").with_unread(2, 0),
            Chat::new("news", "News").with_unread(9, 1).archived(),
        ],
    }])?;
    sim.advance(STEP_MS)?;

    // A follower scrolls a chat; the master does the fetching
    let limit = config.message_list_slice;
    let now_ms = sim.now_ms;
    let ticket = sim.follower()?.execute(
        Command::FetchHistory {
            chat_id: general.clone(),
            thread_id: ThreadId::Main,
            anchor: None,
            direction: Direction::Backwards,
            limit,
        },
        now_ms,
    )?;
    if ticket.status != TicketStatus::Forwarded {
        warn!("History fetch was not forwarded: {:?}", ticket.status);
    }
    sim.advance(STEP_MS)?;

    // Live traffic
    for i in 0..5 {
        let message = sim.server.receive(&general, &alice, &format!("live {}", i));
        sim.master()?.apply_update(UpdateEvent::NewMessage { message })?;
    }
    sim.advance(STEP_MS)?;
    sim.check_convergence()?;

    // The master crashes without closing
    let crashed = sim.master_index().context("No master tab")?;
    let crashed = sim.tabs.remove(crashed);
    warn!("[{:>6}ms] tab {} crashed", sim.now_ms, crashed.tab_id());
    drop(crashed);
    sim.advance(config.master_timeout_ms + 2 * config.heartbeat_interval_ms)?;

    let follower_id = sim.follower()?.tab_id().clone();
    let now_ms = sim.now_ms;
    sim.follower()?.execute(
        Command::SendMessage {
            chat_id: general.clone(),
            thread_id: ThreadId::Main,
            text: format!("hello from {}", follower_id),
        },
        now_ms,
    )?;
    sim.advance(STEP_MS)?;
    sim.check_convergence()?;

    let viewport = query::viewport_ids(
        sim.master()?.state(),
        &general,
        ThreadId::Main,
        None,
        Direction::Backwards,
        config.viewport_limit,
    );
    info!("Viewport of {} holds {} messages", general, viewport.len());

    // Orderly shutdown; the master writes the cache on close
    let now_ms = sim.now_ms;
    for tab in &mut sim.tabs {
        tab.close(now_ms);
    }
    sim.report_events();
    Ok(())
}

fn open_snapshots(config: &EngineConfig) -> Result<Arc<dyn SnapshotStore>> {
    let store = match config::config_path(SNAPSHOT_DB) {
        Some(path) => SqliteSnapshotStore::new(&path, config.snapshot_key())?,
        None => {
            warn!("No config directory, keeping the snapshot in memory");
            SqliteSnapshotStore::in_memory(config.snapshot_key())?
        }
    };
    Ok(Arc::new(store))
}
