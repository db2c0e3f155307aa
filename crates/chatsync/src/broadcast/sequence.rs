//! Per-origin delta numbering and gap detection

use std::collections::HashMap;

use crate::models::TabId;

/// Numbers the deltas one tab originates, starting at 1
#[derive(Debug, Clone, Default)]
pub struct DeltaSequencer {
    last_issued: u64,
}

impl DeltaSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqDecision {
    /// Next in order; the watermark has advanced
    Apply,
    /// Already applied
    Duplicate,
    /// At least one delta from this origin was lost
    Gap { expected: u64, got: u64 },
}

/// Last applied sequence number per origin tab
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    watermarks: HashMap<TabId, u64>,
    /// Accept the first seq of an unseen origin as its baseline
    adopt_unknown: bool,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what to do with delta `seq` from `origin`
    ///
    /// Only `Apply` moves the watermark; a gap leaves it where it was so the
    /// caller can resync.
    pub fn observe(&mut self, origin: &TabId, seq: u64) -> SeqDecision {
        let last = match self.watermarks.get(origin) {
            Some(&last) => last,
            None if self.adopt_unknown => seq.saturating_sub(1),
            None => 0,
        };

        if seq <= last {
            return SeqDecision::Duplicate;
        }
        if seq != last + 1 {
            return SeqDecision::Gap {
                expected: last + 1,
                got: seq,
            };
        }
        self.watermarks.insert(origin.clone(), seq);
        SeqDecision::Apply
    }

    /// Replace every watermark with those of a received full state
    pub fn reset(&mut self, watermarks: HashMap<TabId, u64>) {
        self.watermarks = watermarks;
        self.adopt_unknown = false;
    }

    /// Trust whatever sequence an origin is at when first heard from
    ///
    /// Used when running from a possibly stale cache, where the deltas that
    /// came before are already folded into the cached state or lost for good.
    pub fn adopt_unknown_origins(&mut self) {
        self.adopt_unknown = true;
    }

    pub fn watermark(&self, origin: &TabId) -> Option<u64> {
        self.watermarks.get(origin).copied()
    }

    pub fn watermarks(&self) -> &HashMap<TabId, u64> {
        &self.watermarks
    }

    /// Record a delta this tab produced itself
    pub fn record_own(&mut self, origin: &TabId, seq: u64) {
        self.watermarks.insert(origin.clone(), seq);
    }
}
