//! Binary entry point for a standalone mining session (SPEC_FULL.md §10:
//! `paris::Logger` narration at the boundary, `log`/`env_logger` inside the
//! library crates this binary drives). Packaging and a real CLI are out of
//! scope for the mining core (SPEC_FULL.md §1); this wires a demo session
//! against an empty genesis weave so the binary is runnable end to end, the
//! same way `block_scraper/src/main.rs` wires its own collaborators directly
//! rather than through a framework.
//!
//! A real node replaces [`demo_collaborators`] with its own chunk store,
//! wallet store, tx replay pool and retarget module; nothing else in
//! [`spora_miner`] needs to change to host them.

use color_eyre::eyre::Result;
use paris::Logger;
use spora_miner::{Collaborators, MinerConfig, MiningSession, RoundResult};
use spora_store::ChunkStore;
use spora_types::candidate::CandidateBlock;
use spora_types::consensus::RANDOMX_PACKING_KEY;
use spora_types::{H256, H384, U256};
use spora_validator::validate::BlockIndex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

mod demo_collaborators {
    //! Minimal in-process stand-ins for the collaborators the mining core
    //! consumes but does not implement (SPEC_FULL.md §6). An empty weave with
    //! `upper_bound == 0` drives the small-weave path (SPEC_FULL.md §4.5), so
    //! this demo never needs a populated chunk store to find a solution.

    use spora_store::{Chunk, ChunkStore, DataIndex};
    use spora_types::{CandidateBlock, PoaData, H256, H384, U256};
    use spora_validator::validate::{BlockIndex, PoaStore, PoaValidator};
    use std::collections::HashMap;

    pub struct EmptyChunkStore;
    impl ChunkStore for EmptyChunkStore {
        fn get(&self, _byte_offset: u128) -> Option<Chunk> {
            None
        }
    }
    impl DataIndex for EmptyChunkStore {
        fn get(&self, _byte_offset: u128) -> Option<Chunk> {
            None
        }
    }

    pub struct NoTxPool;
    impl spora_miner::TxReplayPool for NoTxPool {
        fn pick(&self, _anchors: &[H256], _height: u64, _diff: U256, _timestamp: u64) -> Vec<H256> {
            vec![]
        }
        fn data_size(&self, _tx_ids: &[H256]) -> u64 {
            0
        }
    }

    pub struct StaticWalletStore;
    impl spora_miner::WalletStore for StaticWalletStore {
        fn get(&self, _root: H384, _addresses: &[H256]) -> HashMap<H256, u64> {
            HashMap::new()
        }
        fn apply_txs(&self, wallets_root: H384, _tx_ids: &[H256]) -> H384 {
            wallets_root
        }
        fn apply_mining_reward(&self, wallets_root: H384, _reward_address: H256, _reward: u64) -> H384 {
            wallets_root
        }
    }

    pub struct FlatRetarget;
    impl spora_miner::RetargetModule for FlatRetarget {
        fn maybe_retarget(&self, current: &CandidateBlock, _timestamp: u64) -> U256 {
            current.diff
        }
        fn is_retarget_height(&self, _height: u64) -> bool {
            false
        }
        fn next_cumulative_diff(&self, cumulative_diff: U256, diff: U256, _height: u64) -> U256 {
            cumulative_diff + diff
        }
    }

    pub struct ZeroRewardPolicy;
    impl spora_miner::RewardPolicy for ZeroRewardPolicy {
        fn compute(&self, _current: &CandidateBlock, _block_size: u64, _timestamp: u64) -> (u64, u64) {
            (0, 0)
        }
    }

    pub struct EmptyTxRootBuilder;
    impl spora_miner::TxRootBuilder for EmptyTxRootBuilder {
        fn root(&self, _tx_ids: &[H256]) -> H256 {
            H256::zero()
        }
    }

    pub struct NoPoaStore;
    impl PoaStore for NoPoaStore {
        fn get_poa_from_v2_index(&self, _recall_byte: u128) -> Option<PoaData> {
            Some(PoaData::empty())
        }
    }

    pub struct AcceptingPoaValidator;
    impl PoaValidator for AcceptingPoaValidator {
        fn validate(&self, _recall_byte: u128, _block_index: &dyn BlockIndex, _poa: &PoaData) -> bool {
            true
        }
    }

    pub struct DemoBlockIndex;
    impl BlockIndex for DemoBlockIndex {}
}

fn demo_collaborators() -> Collaborators {
    use demo_collaborators::*;
    Collaborators {
        tx_pool: Arc::new(NoTxPool),
        wallet_store: Arc::new(StaticWalletStore),
        retarget: Arc::new(FlatRetarget),
        reward_policy: Arc::new(ZeroRewardPolicy),
        tx_root_builder: Arc::new(EmptyTxRootBuilder),
        chunk_store: Arc::new(EmptyChunkStore) as Arc<dyn ChunkStore>,
        data_index: None,
        poa_store: Arc::new(NoPoaStore),
        poa_validator: Arc::new(AcceptingPoaValidator),
        block_index: Arc::new(DemoBlockIndex) as Arc<dyn BlockIndex>,
    }
}

fn genesis_block() -> CandidateBlock {
    CandidateBlock {
        height: 0,
        previous_block_hash: H384::zero(),
        hash_list_merkle: H384::zero(),
        reward_address: H256::zero(),
        tags: vec![],
        tx_ids: vec![],
        tx_root: H256::zero(),
        block_size: 0,
        weave_size: 0,
        wallet_list_root: H384::zero(),
        timestamp: now_secs(),
        last_retarget: now_secs(),
        diff: U256::from(1u64),
        cumulative_diff: U256::zero(),
        reward_pool: 0,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs()
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();
    let mut logger = Logger::new();

    logger.info("starting SPoRA mining session (empty demo weave)");

    let config = MinerConfig::from_env();
    let collaborators = demo_collaborators();
    let current_block = genesis_block();
    // An empty weave (`upper_bound == 0`) always routes to the small-weave
    // worker (SPEC_FULL.md §4.5); a real node computes this from the chain's
    // `SEARCH_SPACE_UPPER_BOUND_DEPTH`-blocks-back weave size instead.
    let upper_bound: u128 = 0;

    let session = MiningSession::start(
        config,
        collaborators,
        RANDOMX_PACKING_KEY,
        current_block,
        upper_bound,
        now_secs(),
    );

    // No stop signal wired up in this demo binary; a real node would send on
    // this channel from its shutdown handler (SPEC_FULL.md §4.7 "Stop").
    let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    match session.run(stop_rx, now_secs) {
        RoundResult::Complete(work_complete) => {
            logger.success(format!(
                "found solution at height {} (block hash {:?})",
                work_complete.final_block.height, work_complete.current_block_hash
            ));
        }
        RoundResult::Stopped => {
            logger.info("mining session stopped");
        }
    }

    Ok(())
}
