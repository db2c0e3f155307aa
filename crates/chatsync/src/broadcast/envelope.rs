//! Wire shape of cross-tab messages

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::Action;
use crate::engine::{Command, CommandOutcome};
use crate::error::ChannelError;
use crate::models::{TabId, TabRole};
use crate::state::State;

/// A full copy of a tab's state plus the delta watermarks it reflects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub state: State,
    /// Last delta sequence applied per origin tab
    #[serde(default)]
    pub watermarks: HashMap<TabId, u64>,
}

/// Message exchanged between tabs
///
/// Serialized as `{ "kind": "<kebab-case>", ...camelCase fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Envelope {
    FullStateRequest {
        requester_tab_id: TabId,
    },
    FullState {
        target_tab_id: TabId,
        payload: Box<StateSnapshot>,
    },
    Delta {
        origin_tab_id: TabId,
        seq: u64,
        payload: Vec<Action>,
    },
    MasterClaim {
        tab_id: TabId,
        timestamp: i64,
    },
    Heartbeat {
        tab_id: TabId,
        timestamp: i64,
        role: TabRole,
    },
    ForwardedCommand {
        origin_tab_id: TabId,
        request_id: u64,
        command: Command,
    },
    CommandResult {
        target_tab_id: TabId,
        request_id: u64,
        outcome: CommandOutcome,
    },
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::FullStateRequest { .. } => "full-state-request",
            Envelope::FullState { .. } => "full-state",
            Envelope::Delta { .. } => "delta",
            Envelope::MasterClaim { .. } => "master-claim",
            Envelope::Heartbeat { .. } => "heartbeat",
            Envelope::ForwardedCommand { .. } => "forwarded-command",
            Envelope::CommandResult { .. } => "command-result",
        }
    }

    /// Whether a tab should look at this message at all
    ///
    /// Broadcast kinds are for everyone; answers are addressed to one tab.
    pub fn is_for(&self, tab_id: &TabId) -> bool {
        match self {
            Envelope::FullState { target_tab_id, .. } | Envelope::CommandResult { target_tab_id, .. } => {
                target_tab_id == tab_id
            }
            _ => true,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(ChannelError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(bytes).map_err(ChannelError::Decode)
    }
}
