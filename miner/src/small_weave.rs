//! The small-weave worker (SPEC_FULL.md §4.5): the degenerate single-threaded
//! path used when the weave is too small to support recall. Shares the same
//! `randomx_fast` collaborator call as the stage-two worker, differing only
//! in that the chunk half of the preimage is always empty (SPEC_FULL.md §9,
//! resolved open question).

use spora_types::{BestHashRegister, MiningMetrics, Solution};
use spora_validator::hash::{clears_difficulty, compute_h0, compute_solution_hash, FastHasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::messages::ControllerMessage;
use crate::state::SharedMiningState;
use crossbeam_channel::Sender;
use rand::RngCore;

pub struct SmallWeaveWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SmallWeaveWorker {
    pub fn spawn(
        hasher: Arc<FastHasher>,
        state: SharedMiningState,
        metrics: Arc<MiningMetrics>,
        best_hash: Arc<BestHashRegister>,
        to_controller: Sender<ControllerMessage>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("spora-small-weave-worker".into())
            .spawn(move || run(hasher, state, metrics, best_hash, to_controller, stop_flag))
            .expect("failed to spawn small-weave worker thread");
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
    hasher: Arc<FastHasher>,
    state: SharedMiningState,
    metrics: Arc<MiningMetrics>,
    best_hash: Arc<BestHashRegister>,
    to_controller: Sender<ControllerMessage>,
    stop: Arc<AtomicBool>,
) {
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        let current = state.read().expect("mining state lock poisoned").clone();

        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);

        let h0 = compute_h0(&hasher, &nonce, &current.bds);
        let solution_hash = compute_solution_hash(&hasher, &h0, &current.prev_h, current.timestamp(), &[]);
        metrics.record_hash_attempt();

        if clears_difficulty(&solution_hash, &current.diff) {
            let solution = Solution {
                session: current.session.token,
                nonce,
                h0,
                timestamp: current.timestamp(),
                solution_hash,
            };
            let _ = to_controller.send(ControllerMessage::Solution(solution));
        } else {
            best_hash.update_if_closer(&solution_hash);
        }
    }
}
