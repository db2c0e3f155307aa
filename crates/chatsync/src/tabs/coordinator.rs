//! Master tab election
//!
//! The claim lives in the shared key/value store. A tab that finds no live
//! claim writes its own, waits out the settle window and re-reads the key:
//! whoever's id is still there is master. The master renews the claim every
//! heartbeat and re-reads it first, so a tab that lost the key steps down
//! within one heartbeat interval.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::SharedKv;
use crate::broadcast::Envelope;
use crate::config::EngineConfig;
use crate::models::{TabId, TabRecord, TabRole};

/// Value stored under the master key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterClaim {
    pub tab_id: TabId,
    pub claimed_at: i64,
    pub heartbeat_at: i64,
}

impl MasterClaim {
    pub fn is_live(&self, now_ms: i64, timeout_ms: i64) -> bool {
        now_ms - self.heartbeat_at <= timeout_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub from: TabRole,
    pub to: TabRole,
}

/// What the coordinator wants done after an input
#[derive(Debug, Default)]
pub struct Step {
    /// Envelopes to post on the broadcast channel
    pub envelopes: Vec<Envelope>,
    pub role_change: Option<RoleChange>,
}

impl Step {
    fn record(&mut self, from: TabRole, to: TabRole) {
        let from = self.role_change.map_or(from, |change| change.from);
        self.role_change = (from != to).then_some(RoleChange { from, to });
    }
}

pub struct TabCoordinator {
    tab_id: TabId,
    kv: Arc<dyn SharedKv>,
    master_key: String,
    heartbeat_interval_ms: i64,
    master_timeout_ms: i64,
    settle_window_ms: i64,
    role: TabRole,
    settling_until: Option<i64>,
    last_heartbeat_ms: Option<i64>,
    peers: BTreeMap<TabId, TabRecord>,
}

impl TabCoordinator {
    pub fn new(tab_id: TabId, kv: Arc<dyn SharedKv>, config: &EngineConfig) -> Self {
        Self {
            tab_id,
            kv,
            master_key: config.master_key(),
            heartbeat_interval_ms: config.heartbeat_interval_ms,
            master_timeout_ms: config.master_timeout_ms,
            settle_window_ms: config.settle_window_ms,
            role: TabRole::Unestablished,
            settling_until: None,
            last_heartbeat_ms: None,
            peers: BTreeMap::new(),
        }
    }

    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    pub fn role(&self) -> TabRole {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role == TabRole::Master
    }

    pub fn is_settling(&self) -> bool {
        self.settling_until.is_some()
    }

    /// Peers heard from within the master timeout
    pub fn peers(&self) -> impl Iterator<Item = &TabRecord> {
        self.peers.values()
    }

    /// The tab holding a live claim, if any
    pub fn current_master(&self, now_ms: i64) -> Option<TabId> {
        self.read_claim()
            .filter(|claim| claim.is_live(now_ms, self.master_timeout_ms))
            .map(|claim| claim.tab_id)
    }

    /// Run the startup election
    pub fn start(&mut self, now_ms: i64) -> Step {
        let mut step = Step::default();
        self.elect(now_ms, &mut step);
        self.heartbeat(now_ms, &mut step);
        step
    }

    /// Advance timers: settle confirmation, heartbeat, claim lapse
    pub fn tick(&mut self, now_ms: i64) -> Step {
        let mut step = Step::default();
        let timeout = self.master_timeout_ms;
        self.peers.retain(|_, record| !record.is_stale(now_ms, timeout));

        if let Some(until) = self.settling_until
            && now_ms >= until
        {
            self.confirm(now_ms, &mut step);
        }

        if self.role == TabRole::Follower
            && self.current_master(now_ms).is_none()
        {
            info!("Tab {}: master claim lapsed, re-running election", self.tab_id);
            self.elect(now_ms, &mut step);
        }

        let due = self
            .last_heartbeat_ms
            .is_none_or(|last| now_ms - last >= self.heartbeat_interval_ms);
        if due {
            self.heartbeat(now_ms, &mut step);
        }
        step
    }

    /// React to a coordination envelope from another tab
    pub fn handle(&mut self, envelope: &Envelope, now_ms: i64) -> Step {
        let mut step = Step::default();
        match envelope {
            Envelope::Heartbeat { tab_id, role, .. } => {
                self.record_peer(tab_id, *role, now_ms);
                if *role == TabRole::Master && self.is_master() {
                    self.verify_claim(now_ms, &mut step);
                }
            }
            Envelope::MasterClaim { tab_id, .. } => {
                self.record_peer(tab_id, TabRole::Unestablished, now_ms);
                if self.is_master() {
                    self.verify_claim(now_ms, &mut step);
                }
            }
            _ => {}
        }
        step
    }

    /// Release the claim if this tab holds it
    pub fn close(&mut self) -> Option<RoleChange> {
        if self
            .read_claim()
            .is_some_and(|claim| claim.tab_id == self.tab_id)
        {
            self.kv.remove(&self.master_key);
            info!("Tab {} released the master claim", self.tab_id);
        }
        self.settling_until = None;

        let mut step = Step::default();
        self.set_role(TabRole::Unestablished, &mut step);
        step.role_change
    }

    fn elect(&mut self, now_ms: i64, step: &mut Step) {
        if let Some(claim) = self.read_claim()
            && claim.tab_id != self.tab_id
            && claim.is_live(now_ms, self.master_timeout_ms)
        {
            debug!("Tab {}: live claim held by {}", self.tab_id, claim.tab_id);
            self.set_role(TabRole::Follower, step);
            return;
        }

        self.write_claim(&MasterClaim {
            tab_id: self.tab_id.clone(),
            claimed_at: now_ms,
            heartbeat_at: now_ms,
        });
        step.envelopes.push(Envelope::MasterClaim {
            tab_id: self.tab_id.clone(),
            timestamp: now_ms,
        });
        self.settling_until = Some(now_ms + self.settle_window_ms);
        debug!("Tab {} claimed master, settling", self.tab_id);

        if self.settle_window_ms == 0 {
            self.confirm(now_ms, step);
        }
    }

    fn confirm(&mut self, now_ms: i64, step: &mut Step) {
        self.settling_until = None;
        match self.read_claim() {
            Some(claim) if claim.tab_id == self.tab_id => {
                self.write_claim(&MasterClaim {
                    heartbeat_at: now_ms,
                    ..claim
                });
                self.set_role(TabRole::Master, step);
            }
            _ => self.set_role(TabRole::Follower, step),
        }
    }

    /// Step down if another tab holds a live claim
    fn verify_claim(&mut self, now_ms: i64, step: &mut Step) -> bool {
        match self.read_claim() {
            Some(claim) if claim.tab_id != self.tab_id && claim.is_live(now_ms, self.master_timeout_ms) => {
                warn!(
                    "Tab {}: claim taken over by {}, stepping down",
                    self.tab_id, claim.tab_id
                );
                self.set_role(TabRole::Follower, step);
                false
            }
            _ => true,
        }
    }

    fn heartbeat(&mut self, now_ms: i64, step: &mut Step) {
        if self.is_master() && self.verify_claim(now_ms, step) {
            let claimed_at = self
                .read_claim()
                .filter(|claim| claim.tab_id == self.tab_id)
                .map_or(now_ms, |claim| claim.claimed_at);
            self.write_claim(&MasterClaim {
                tab_id: self.tab_id.clone(),
                claimed_at,
                heartbeat_at: now_ms,
            });
        }

        self.last_heartbeat_ms = Some(now_ms);
        step.envelopes.push(Envelope::Heartbeat {
            tab_id: self.tab_id.clone(),
            timestamp: now_ms,
            role: self.role,
        });
    }

    fn record_peer(&mut self, tab_id: &TabId, role: TabRole, now_ms: i64) {
        let record = self
            .peers
            .entry(tab_id.clone())
            .or_insert_with(|| TabRecord::new(tab_id.clone(), now_ms));
        record.last_seen_ms = now_ms;
        if role != TabRole::Unestablished {
            record.role = role;
        }
    }

    fn set_role(&mut self, to: TabRole, step: &mut Step) {
        if self.role == to {
            return;
        }
        info!("Tab {}: {:?} -> {:?}", self.tab_id, self.role, to);
        step.record(self.role, to);
        self.role = to;
    }

    fn read_claim(&self) -> Option<MasterClaim> {
        let raw = self.kv.get(&self.master_key)?;
        match serde_json::from_str(&raw) {
            Ok(claim) => Some(claim),
            Err(e) => {
                warn!("Ignoring malformed master claim: {}", e);
                None
            }
        }
    }

    fn write_claim(&self, claim: &MasterClaim) {
        match serde_json::to_string(claim) {
            Ok(raw) => self.kv.set(&self.master_key, &raw),
            Err(e) => warn!("Failed to encode master claim: {}", e),
        }
    }
}
