//! External collaborator boundaries consumed by the candidate refresher and
//! the session controller (SPEC_FULL.md §6). None of these are implemented by
//! this crate — block propagation, the transaction replay pool, wallet
//! storage, and difficulty retargeting all live outside the mining core.

use spora_types::{CandidateBlock, H256, H384, U256};

/// A snapshot of the wallet list sufficient to price and apply a set of
/// transactions (SPEC_FULL.md §4.6 step 6).
pub trait WalletStore: Send + Sync {
    /// `get(root, addresses) -> wallet_map`, as a dense map of balances keyed
    /// by address; callers only ever look up the addresses they name.
    fn get(&self, root: H384, addresses: &[H256]) -> std::collections::HashMap<H256, u64>;

    /// Applies `txs` to a wallet snapshot, returning the updated root.
    fn apply_txs(&self, wallets_root: H384, tx_ids: &[H256]) -> H384;

    /// Applies the block's mining reward to a wallet snapshot, returning the
    /// updated root.
    fn apply_mining_reward(&self, wallets_root: H384, reward_address: H256, reward: u64) -> H384;
}

/// Picks the transaction set for the next candidate block
/// (SPEC_FULL.md §4.6 step 3).
pub trait TxReplayPool: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn pick(
        &self,
        anchors: &[H256],
        height: u64,
        diff: U256,
        timestamp: u64,
    ) -> Vec<H256>;

    /// Total on-chain data size, in bytes, of the given transaction ids.
    fn data_size(&self, tx_ids: &[H256]) -> u64;
}

/// Difficulty retargeting arithmetic (SPEC_FULL.md §4.6 step 2, §6).
pub trait RetargetModule: Send + Sync {
    fn maybe_retarget(&self, current: &CandidateBlock, timestamp: u64) -> U256;
    fn is_retarget_height(&self, height: u64) -> bool;
    fn next_cumulative_diff(&self, cumulative_diff: U256, diff: U256, height: u64) -> U256;
}

/// Computes the Merkle root over a block's included transaction ids. Merkle
/// tree construction itself is out of scope for the mining core
/// (SPEC_FULL.md §1 "block data segment serialization"); this is the seam the
/// candidate refresher calls across to get `tx_root`.
pub trait TxRootBuilder: Send + Sync {
    fn root(&self, tx_ids: &[H256]) -> H256;
}

/// The external finder-reward and reward-pool computation
/// (SPEC_FULL.md §4.6 step 5). Kept separate from [`RetargetModule`] since the
/// reference workspace treats reward accounting and difficulty retargeting as
/// distinct collaborators.
pub trait RewardPolicy: Send + Sync {
    /// Returns `(finder_reward, new_reward_pool)`.
    fn compute(&self, current: &CandidateBlock, block_size: u64, timestamp: u64) -> (u64, u64);
}
