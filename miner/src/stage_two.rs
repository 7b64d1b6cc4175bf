//! The stage-two worker (SPEC_FULL.md §4.4): receives a fetched chunk,
//! computes the solution hash, tests difficulty, and either reports a
//! solution to the controller or updates the best-hash register.

use crossbeam_channel::{tick, Receiver, Sender};
use spora_store::FetchedChunk;
use spora_types::consensus::{STALE_MESSAGE_TOLERANCE_SECS, WORKER_IDLE_TICK_MS};
use spora_types::{BestHashRegister, MiningMetrics, Solution};
use spora_validator::hash::{compute_solution_hash, clears_difficulty, FastHasher};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::messages::ControllerMessage;
use crate::state::SharedMiningState;

pub struct StageTwoWorker {
    /// Handed directly to I/O workers as `FetchRequest::stage_two`; the data
    /// channel's type is `spora_store`'s, so no adapter thread is needed.
    inbox: Sender<FetchedChunk>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StageTwoWorker {
    pub fn spawn(
        hasher: Arc<FastHasher>,
        state: SharedMiningState,
        metrics: Arc<MiningMetrics>,
        best_hash: Arc<BestHashRegister>,
        to_controller: Sender<ControllerMessage>,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<FetchedChunk>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("spora-stage2-worker".into())
            .spawn(move || run(hasher, state, metrics, best_hash, to_controller, rx, stop_rx))
            .expect("failed to spawn stage-two worker thread");
        Self { inbox: tx, stop_tx, handle: Some(handle) }
    }

    pub fn inbox(&self) -> Sender<FetchedChunk> {
        self.inbox.clone()
    }

    /// Sends an explicit stop signal over a dedicated control channel
    /// (SPEC_FULL.md §9: "Stop uses channel closure or an explicit `Stop`
    /// variant"). A separate channel, rather than a `Stop` variant on the data
    /// channel, is used here because I/O workers also hold live senders into
    /// the data inbox and should not need to agree on a shared message type.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    hasher: Arc<FastHasher>,
    state: SharedMiningState,
    metrics: Arc<MiningMetrics>,
    best_hash: Arc<BestHashRegister>,
    to_controller: Sender<ControllerMessage>,
    rx: Receiver<FetchedChunk>,
    stop_rx: Receiver<()>,
) {
    let ticker = tick(Duration::from_millis(WORKER_IDLE_TICK_MS));
    loop {
        crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(rx) -> msg => match msg {
                Ok(fetched) => handle_fetched(&hasher, &state, &metrics, &best_hash, &to_controller, fetched),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                // Idle tick: nothing persistent to drain beyond per-message checks.
            }
        }
    }
}

fn handle_fetched(
    hasher: &FastHasher,
    state: &SharedMiningState,
    metrics: &MiningMetrics,
    best_hash: &BestHashRegister,
    to_controller: &Sender<ControllerMessage>,
    fetched: FetchedChunk,
) {
    let current = state.read().expect("mining state lock poisoned").clone();
    if fetched.session != current.session.token {
        return;
    }
    if fetched.timestamp + STALE_MESSAGE_TOLERANCE_SECS < current.timestamp() {
        return;
    }

    let solution_hash =
        compute_solution_hash(hasher, &fetched.h0, &current.prev_h, fetched.timestamp, &fetched.chunk);
    metrics.record_hash_attempt();

    if clears_difficulty(&solution_hash, &fetched.diff) {
        let solution = Solution {
            session: fetched.session,
            nonce: fetched.nonce,
            h0: fetched.h0,
            timestamp: fetched.timestamp,
            solution_hash,
        };
        let _ = to_controller.send(ControllerMessage::Solution(solution));
    } else {
        best_hash.update_if_closer(&solution_hash);
    }
}
