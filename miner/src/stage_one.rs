//! The stage-one worker (SPEC_FULL.md §4.3): drives bulk RandomX fast-hashing
//! over a nonce stream, derives a recall byte per `(nonce, H0)` pair, and
//! dispatches the fetch request to an I/O worker.
//!
//! The reference network's `bulk_hash_fast` is a single external call that
//! internally generates nonces, hashes, derives recall bytes and dispatches
//! in one native round-trip (SPEC_FULL.md §6). This worker reimplements that
//! loop directly in terms of the `FastHasher`/`derive_recall_byte`
//! collaborators so the dispatch step can go through the typed
//! [`IoDispatcher`] interface rather than a raw worker-handle argument.

use rand::RngCore;
use spora_store::{FetchRequest, IoMessage};
use spora_types::{MiningMetrics, SessionToken};
use spora_validator::hash::compute_h0;
use spora_validator::recall::{derive_recall_byte, RecallByteError};
use spora_validator::FastHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::dispatch::{IoDispatcher, StageTwoDispatcher};
use crate::messages::UpdateState;
use crate::state::SharedMiningState;

pub struct StageOneConfig {
    /// Nonces hashed per batch before re-reading the shared state.
    pub batch_iterations: u64,
}

pub struct StageOneWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StageOneWorker {
    pub fn spawn(
        config: StageOneConfig,
        hasher: Arc<FastHasher>,
        state: SharedMiningState,
        metrics: Arc<MiningMetrics>,
        io_dispatcher: Arc<dyn IoDispatcher>,
        stage_two_dispatcher: Arc<dyn StageTwoDispatcher>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("spora-stage1-worker".into())
            .spawn(move || {
                run(config, hasher, state, metrics, io_dispatcher, stage_two_dispatcher, stop_flag)
            })
            .expect("failed to spawn stage-one worker thread");
        Self { stop, handle: Some(handle) }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    config: StageOneConfig,
    hasher: Arc<FastHasher>,
    state: SharedMiningState,
    metrics: Arc<MiningMetrics>,
    io_dispatcher: Arc<dyn IoDispatcher>,
    stage_two_dispatcher: Arc<dyn StageTwoDispatcher>,
    stop: Arc<AtomicBool>,
) {
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        let current = state.read().expect("mining state lock poisoned").clone();

        let Some(stage_two) = stage_two_dispatcher.choose() else {
            // No stage-two workers available: skip the batch (SPEC_FULL.md §4.3).
            continue;
        };

        for _ in 0..config.batch_iterations {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let mut nonce = [0u8; 32];
            rng.fill_bytes(&mut nonce);
            let h0 = compute_h0(&hasher, &nonce, &current.bds);

            match derive_recall_byte(&h0, &current.prev_h, current.upper_bound) {
                Ok(byte_offset) => {
                    let request = FetchRequest {
                        byte_offset,
                        h0,
                        nonce,
                        timestamp: current.timestamp(),
                        diff: current.diff,
                        session: current.session.token,
                        stage_two: stage_two.clone(),
                    };
                    let inbox = io_dispatcher.route(byte_offset);
                    let _ = inbox.send(IoMessage::Fetch(request));
                }
                Err(RecallByteError::WeaveTooSmall) => {
                    // The controller should be running the small-weave worker
                    // instead in this configuration; nothing to dispatch here.
                }
            }
        }
        metrics.record_recall_bytes(config.batch_iterations);
    }
}

/// Applies a broadcast [`UpdateState`] by replacing the shared mining state.
/// Exposed as a free function since every worker role reads from the same
/// `SharedMiningState` handle; the controller calls this once per refresh
/// rather than each worker maintaining its own copy.
pub fn apply_update(state: &SharedMiningState, update: &UpdateState) {
    let mut guard = state.write().expect("mining state lock poisoned");
    guard.session.token = update.session;
    guard.session.timestamp = update.timestamp;
    guard.diff = update.diff;
    guard.bds = update.bds.clone();
    guard.prev_h = update.prev_h;
    guard.upper_bound = update.upper_bound;
}
