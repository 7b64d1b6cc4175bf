//! The candidate history (SPEC_FULL.md §3 "Candidate history", §4.6, §4.7):
//! a bounded `timestamp -> (candidate, BDS)` map retaining the last 20 seconds
//! of refreshes so a late-arriving `Solution` tagged with an older timestamp
//! can still be looked up and validated.

use spora_types::consensus::CANDIDATE_HISTORY_WINDOW_SECS;
use spora_types::{BlockDataSegment, CandidateBlock};
use std::collections::BTreeMap;

/// Bounded by [`CANDIDATE_HISTORY_WINDOW_SECS`]; entries older than
/// `current_timestamp - window` are evicted on every refresh (SPEC_FULL.md §3,
/// §8 invariant 7).
#[derive(Default)]
pub struct CandidateHistory {
    by_timestamp: BTreeMap<u64, (CandidateBlock, BlockDataSegment)>,
}

impl CandidateHistory {
    pub fn new() -> Self {
        Self { by_timestamp: BTreeMap::new() }
    }

    /// Records a refreshed candidate at its timestamp, then evicts every
    /// entry with `ts + window <= current_timestamp`.
    pub fn insert(&mut self, candidate: CandidateBlock, bds: BlockDataSegment) {
        let timestamp = candidate.timestamp;
        self.by_timestamp.insert(timestamp, (candidate, bds));
        self.evict_older_than(timestamp);
    }

    fn evict_older_than(&mut self, current_timestamp: u64) {
        self.by_timestamp
            .retain(|&ts, _| ts + CANDIDATE_HISTORY_WINDOW_SECS > current_timestamp);
    }

    pub fn get(&self, timestamp: u64) -> Option<&(CandidateBlock, BlockDataSegment)> {
        self.by_timestamp.get(&timestamp)
    }

    /// Whether `timestamp` has already been used by an entry in the history;
    /// the refresher never reissues a timestamp already present here
    /// (SPEC_FULL.md §4.6 "Timestamp choice").
    pub fn contains_timestamp(&self, timestamp: u64) -> bool {
        self.by_timestamp.contains_key(&timestamp)
    }

    pub fn latest_timestamp(&self) -> Option<u64> {
        self.by_timestamp.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.by_timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_timestamp.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_timestamp.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_at(ts: u64) -> CandidateBlock {
        CandidateBlock { timestamp: ts, ..Default::default() }
    }

    #[test]
    fn retains_entries_within_the_window() {
        let mut history = CandidateHistory::new();
        history.insert(candidate_at(100), BlockDataSegment::default());
        history.insert(candidate_at(110), BlockDataSegment::default());
        assert!(history.get(100).is_some());
        assert!(history.get(110).is_some());
    }

    #[test]
    fn evicts_entries_older_than_the_window() {
        let mut history = CandidateHistory::new();
        history.insert(candidate_at(100), BlockDataSegment::default());
        history.insert(candidate_at(100 + CANDIDATE_HISTORY_WINDOW_SECS + 1), BlockDataSegment::default());
        assert!(history.get(100).is_none());
    }

    #[test]
    fn reports_already_used_timestamps() {
        let mut history = CandidateHistory::new();
        history.insert(candidate_at(100), BlockDataSegment::default());
        assert!(history.contains_timestamp(100));
        assert!(!history.contains_timestamp(101));
    }
}
