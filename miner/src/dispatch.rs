//! Worker dispatch (SPEC_FULL.md §9 "Bulk-hash callback passing worker
//! lists"): instead of handing the RandomX bulk-hash primitive a raw list of
//! stage-two worker handles, stage-one workers route through a small
//! `route`/`choose` interface that hides the worker pool's internals.

use crossbeam_channel::Sender;
use spora_store::{FetchedChunk, IoMessage};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Routes a recall-byte fetch to one of the I/O workers. `recall_byte_hint` is
/// accepted so a future partition-aware routing policy (e.g. by storage
/// spindle) can replace the round-robin default without changing call sites.
pub trait IoDispatcher: Send + Sync {
    fn route(&self, recall_byte_hint: u128) -> Sender<IoMessage>;
}

/// Chooses a stage-two worker to hand a fetched chunk to. Returns `None` when
/// no stage-two workers are configured, in which case the stage-one worker
/// skips the batch (SPEC_FULL.md §4.3).
pub trait StageTwoDispatcher: Send + Sync {
    fn choose(&self) -> Option<Sender<FetchedChunk>>;
}

/// Round-robin over a fixed worker list, matching the reference's "pseudo-
/// randomly shuffled" dispatch closely enough for a bounded worker pool: every
/// worker gets an equal share of traffic with no shared mutable shuffle state
/// beyond a single cursor.
pub struct RoundRobinIoDispatcher {
    inboxes: Vec<Sender<IoMessage>>,
    cursor: AtomicUsize,
}

impl RoundRobinIoDispatcher {
    pub fn new(inboxes: Vec<Sender<IoMessage>>) -> Self {
        assert!(!inboxes.is_empty(), "at least one I/O worker is required");
        Self { inboxes, cursor: AtomicUsize::new(0) }
    }
}

impl IoDispatcher for RoundRobinIoDispatcher {
    fn route(&self, _recall_byte_hint: u128) -> Sender<IoMessage> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.inboxes.len();
        self.inboxes[i].clone()
    }
}

pub struct RoundRobinStageTwoDispatcher {
    inboxes: Vec<Sender<FetchedChunk>>,
    cursor: AtomicUsize,
}

impl RoundRobinStageTwoDispatcher {
    pub fn new(inboxes: Vec<Sender<FetchedChunk>>) -> Self {
        Self { inboxes, cursor: AtomicUsize::new(0) }
    }
}

impl StageTwoDispatcher for RoundRobinStageTwoDispatcher {
    fn choose(&self) -> Option<Sender<FetchedChunk>> {
        if self.inboxes.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.inboxes.len();
        Some(self.inboxes[i].clone())
    }
}
