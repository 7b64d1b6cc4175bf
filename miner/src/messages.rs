//! Message types shared across the mining workers (SPEC_FULL.md §9 "Dynamic
//! message dispatch": typed channels and a tagged-union message per worker
//! role, one inbox per worker, in place of the reference's tagged messages to
//! unnamed worker processes).

use spora_types::{SessionToken, Solution, U256};
use std::sync::Arc;

/// Broadcast to every worker on a timestamp refresh or session start
/// (SPEC_FULL.md §4.6 "Refresh scheduling", §4.7). Applied by replacing the
/// shared [`crate::state::SharedMiningState`] rather than pushed down a
/// per-worker channel, since every stage-one/stage-two/small-weave worker
/// already reads that handle on its own hot-loop cadence.
#[derive(Clone)]
pub struct UpdateState {
    pub timestamp: u64,
    pub diff: U256,
    pub bds: Arc<Vec<u8>>,
    pub prev_h: [u8; 32],
    pub upper_bound: u128,
    pub session: SessionToken,
}

/// Sent to the controller by a stage-two or small-weave worker.
pub enum ControllerMessage {
    Solution(Solution),
}
