//! The mutable candidate block and its derived block data segment (BDS).

use crate::hashes::{Base64, H256, H384, U256};
use serde_derive::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A candidate next block, rebuilt by the candidate refresher on every full
/// or partial refresh. Every field is a pure function of
/// `(current_block, included_txs, timestamp)`; changing the timestamp or the
/// tx set always means recomputing the whole struct (see [`crate::consensus`]).
///
/// `Serialize`/`Deserialize` let a JSON fixture (e.g. a captured candidate
/// block from a test node) round-trip through [`serde_json`] the same way the
/// reference workspace's `json_types::ArweaveBlockHeader` does for wire block
/// headers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateBlock {
    pub height: u64,
    pub previous_block_hash: H384,
    pub hash_list_merkle: H384,
    pub reward_address: H256,
    pub tags: Vec<Base64>,
    pub tx_ids: Vec<H256>,
    pub tx_root: H256,
    pub block_size: u64,
    pub weave_size: u64,
    pub wallet_list_root: H384,
    pub timestamp: u64,
    pub last_retarget: u64,
    pub diff: U256,
    pub cumulative_diff: U256,
    pub reward_pool: u64,
}

/// Deterministic byte sequence derived from a [`CandidateBlock`], fed as one of
/// the hash preimages. Built in two phases so that a timestamp-only refresh
/// (the common case, happening every [`crate::consensus::MINING_TIMESTAMP_REFRESH_INTERVAL`]
/// seconds) never re-runs the expensive transaction-dependent base step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockDataSegment {
    /// The expensive, transaction-dependent prefix. Computed once per tx-set change.
    base: Vec<u8>,
    /// The full segment: `base` plus the cheap timestamp-dependent tail.
    finalized: Vec<u8>,
}

impl BlockDataSegment {
    /// Builds the `bds_base` from the transaction-dependent fields of `candidate`.
    /// Grounded on the reference's block-hashing helpers: a flat concatenation of
    /// big-endian-encoded fields, in canonical field order.
    pub fn build_base(candidate: &CandidateBlock) -> Self {
        let mut base = Vec::new();
        base.extend_from_slice(candidate.previous_block_hash.as_bytes());
        base.extend_from_slice(candidate.hash_list_merkle.as_bytes());
        base.extend_from_slice(candidate.reward_address.as_bytes());
        base.extend_from_slice(&candidate.height.to_be_bytes());
        base.extend_from_slice(candidate.tx_root.as_bytes());
        for tag in &candidate.tags {
            base.extend_from_slice(tag.as_slice());
        }
        base.extend_from_slice(&candidate.block_size.to_be_bytes());
        base.extend_from_slice(&candidate.weave_size.to_be_bytes());
        Self { base, finalized: Vec::new() }
    }

    /// Appends the timestamp-dependent tail to a previously computed base,
    /// producing the segment actually hashed this round. Cheap: no hashing or
    /// allocation proportional to transaction count happens here.
    pub fn finalize(&mut self, candidate: &CandidateBlock) {
        let mut buf = self.base.clone();
        buf.extend_from_slice(&candidate.timestamp.to_be_bytes());
        buf.extend_from_slice(&candidate.last_retarget.to_be_bytes());
        let mut diff_bytes = [0u8; 32];
        candidate.diff.to_big_endian(&mut diff_bytes);
        buf.extend_from_slice(&diff_bytes);
        let mut cdiff_bytes = [0u8; 32];
        candidate.cumulative_diff.to_big_endian(&mut cdiff_bytes);
        buf.extend_from_slice(&cdiff_bytes);
        buf.extend_from_slice(&candidate.reward_pool.to_be_bytes());
        buf.extend_from_slice(candidate.wallet_list_root.as_bytes());
        self.finalized = buf;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.finalized
    }
}

/// A per-round unique identifier. Every worker message carries the token of
/// the round that scheduled it; workers drop any message whose token does not
/// match the session's current one. Generated from a monotonic counter rather
/// than random bytes so sessions can never collide within one process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

static NEXT_SESSION_TOKEN: AtomicU64 = AtomicU64::new(1);

impl SessionToken {
    /// Mints a session token that has never been issued before in this process.
    pub fn new() -> Self {
        Self(NEXT_SESSION_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The session's live (token, timestamp) pair. Published by the controller and
/// read without locking by every worker, matching the reference workspace's
/// process-wide session map reimagined as a single atomic-swap struct
/// (see DESIGN.md / SPEC_FULL.md §9 "Session map as process-wide table").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub timestamp: u64,
}

/// A handle workers read the current session from without ever blocking the
/// controller's writes for long: an `RwLock` around a tiny `Copy` struct
/// approximates the "single atomic pointer to an immutable struct" reimagining
/// from SPEC_FULL.md §9 closely enough that a lock-free swap isn't worth the
/// extra dependency.
pub type SharedSession = Arc<RwLock<Session>>;

pub fn new_shared_session(session: Session) -> SharedSession {
    Arc::new(RwLock::new(session))
}

/// A claimed solution, reported by a stage-two or small-weave worker to the
/// controller.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub session: SessionToken,
    pub nonce: [u8; 32],
    pub h0: [u8; 32],
    pub timestamp: u64,
    pub solution_hash: [u8; 32],
}

/// Delivered to the parent on success. Nothing is delivered on a plain `Stop`.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkComplete {
    pub current_block_hash: H384,
    pub final_block: CandidateBlock,
    pub mined_txs: Vec<H256>,
    pub bds: Vec<u8>,
    pub poa: crate::poa::PoaData,
}
