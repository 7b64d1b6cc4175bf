//! The live mining round state, published by the controller and read without
//! locking for long by every worker (SPEC_FULL.md §9 "Session map as
//! process-wide table", generalized here to cover the other per-round fields
//! stage-one and stage-two need: `prev_h`, `diff`, `BDS`, `upper_bound`).

use spora_types::candidate::Session;
use spora_types::U256;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct MiningState {
    pub session: Session,
    pub diff: U256,
    pub bds: Arc<Vec<u8>>,
    pub prev_h: [u8; 32],
    pub upper_bound: u128,
}

impl MiningState {
    pub fn timestamp(&self) -> u64 {
        self.session.timestamp
    }
}

pub type SharedMiningState = Arc<RwLock<MiningState>>;

pub fn new_shared_state(state: MiningState) -> SharedMiningState {
    Arc::new(RwLock::new(state))
}
