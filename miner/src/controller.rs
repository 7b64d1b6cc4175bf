//! The session controller (SPEC_FULL.md §4.7): owns every worker and the
//! candidate state, drives the `Init -> Running -> Validating/Stopped`
//! state machine, and is the only writer of the shared mining state and
//! session handle every worker reads from.

use crossbeam_channel::{after, select, Receiver, Sender};
use openssl::sha::sha256;
use rayon::prelude::*;
use spora_store::{ChunkStore, DataIndex, IoWorker, IoWorkerConfig};
use spora_types::candidate::{new_shared_session, Session};
use spora_types::consensus::SPORA_SEARCH_SPACE_SUBSPACES_COUNT;
use spora_types::{
    BestHashRegister, BlockDataSegment, CandidateBlock, MiningMetrics, PoaData, SessionToken,
    WorkComplete,
};
use spora_validator::recall::{derive_recall_byte, RecallByteError};
use spora_validator::validate::{validate_solution, BlockIndex, PoaStore, PoaValidator, ValidationRequest};
use spora_validator::FastHasher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{RetargetModule, RewardPolicy, TxReplayPool, TxRootBuilder, WalletStore};
use crate::config::MinerConfig;
use crate::dispatch::{IoDispatcher, RoundRobinIoDispatcher, RoundRobinStageTwoDispatcher, StageTwoDispatcher};
use crate::history::CandidateHistory;
use crate::messages::{ControllerMessage, UpdateState};
use crate::refresher::CandidateRefresher;
use crate::small_weave::SmallWeaveWorker;
use crate::stage_one::{apply_update, StageOneConfig, StageOneWorker};
use crate::stage_two::StageTwoWorker;
use crate::state::{new_shared_state, MiningState, SharedMiningState};

/// Everything the controller needs from outside the mining core
/// (SPEC_FULL.md §6). One struct so construction sites name every
/// collaborator in one place, mirroring how the reference's `main.rs` wires
/// its validator dependencies.
pub struct Collaborators {
    pub tx_pool: Arc<dyn TxReplayPool>,
    pub wallet_store: Arc<dyn WalletStore>,
    pub retarget: Arc<dyn RetargetModule>,
    pub reward_policy: Arc<dyn RewardPolicy>,
    pub tx_root_builder: Arc<dyn TxRootBuilder>,
    pub chunk_store: Arc<dyn ChunkStore>,
    pub data_index: Option<Arc<dyn DataIndex>>,
    pub poa_store: Arc<dyn PoaStore>,
    pub poa_validator: Arc<dyn PoaValidator>,
    pub block_index: Arc<dyn BlockIndex>,
}

pub enum RoundResult {
    Complete(WorkComplete),
    Stopped,
}

pub struct MiningSession {
    config: MinerConfig,
    collaborators: Collaborators,
    refresher: CandidateRefresher,
    hasher: Arc<FastHasher>,
    metrics: Arc<MiningMetrics>,
    best_hash: Arc<BestHashRegister>,
    history: CandidateHistory,
    state: SharedMiningState,
    io_session: spora_types::candidate::SharedSession,
    bds_base: BlockDataSegment,
    upper_bound: u128,

    io_workers: Vec<IoWorker>,
    stage_one_workers: Vec<StageOneWorker>,
    stage_two_workers: Vec<StageTwoWorker>,
    small_weave_worker: Option<SmallWeaveWorker>,

    controller_tx: Sender<ControllerMessage>,
    controller_rx: Receiver<ControllerMessage>,
}

impl MiningSession {
    /// Builds a fast-mode hasher, retrying every
    /// [`spora_types::consensus::RANDOMX_NOT_READY_RETRY_SECS`] seconds until
    /// fast-mode RandomX state becomes available (SPEC_FULL.md §7 "Not ready").
    fn acquire_hasher(key: &[u8]) -> Arc<FastHasher> {
        loop {
            if let Some(hasher) = FastHasher::new(key) {
                return Arc::new(hasher);
            }
            log::warn!("randomx fast-mode state not ready, retrying in {}s", spora_types::consensus::RANDOMX_NOT_READY_RETRY_SECS);
            std::thread::sleep(Duration::from_secs(spora_types::consensus::RANDOMX_NOT_READY_RETRY_SECS));
        }
    }

    /// `Init -> Running`: full refresh, spawn workers, publish the session.
    pub fn start(
        config: MinerConfig,
        collaborators: Collaborators,
        randomx_key: &[u8],
        current_block: CandidateBlock,
        upper_bound: u128,
        now_secs: u64,
    ) -> Self {
        let hasher = Self::acquire_hasher(randomx_key);
        let metrics = Arc::new(MiningMetrics::new());
        let best_hash = Arc::new(BestHashRegister::new());
        let history = CandidateHistory::new();

        let refresher = CandidateRefresher {
            tx_pool: collaborators.tx_pool.clone(),
            wallet_store: collaborators.wallet_store.clone(),
            retarget: collaborators.retarget.clone(),
            reward_policy: collaborators.reward_policy.clone(),
            tx_root_builder: collaborators.tx_root_builder.clone(),
        };

        let outcome = refresher.full_refresh(&current_block, &history, Duration::ZERO, now_secs);
        let mut history = history;
        history.insert(outcome.candidate.clone(), outcome.bds.clone());

        let session_token = SessionToken::new();
        let prev_h: [u8; 32] = current_block.previous_block_hash.as_bytes()[..32]
            .try_into()
            .expect("previous_block_hash is at least 32 bytes");

        let mining_state = MiningState {
            session: Session { token: session_token, timestamp: outcome.candidate.timestamp },
            diff: outcome.candidate.diff,
            bds: Arc::new(outcome.bds.as_bytes().to_vec()),
            prev_h,
            upper_bound,
        };
        let state = new_shared_state(mining_state);
        let io_session = new_shared_session(Session { token: session_token, timestamp: outcome.candidate.timestamp });

        let (controller_tx, controller_rx) = crossbeam_channel::unbounded();

        let search_subspace_size = upper_bound / SPORA_SEARCH_SPACE_SUBSPACES_COUNT as u128;
        let mut io_workers = Vec::new();
        let mut stage_one_workers = Vec::new();
        let mut stage_two_workers = Vec::new();
        let mut small_weave_worker = None;

        if search_subspace_size == 0 {
            // No I/O worker pool is spawned on the small-weave path: it never
            // fetches a chunk (SPEC_FULL.md §4.5).
            small_weave_worker = Some(SmallWeaveWorker::spawn(
                hasher.clone(),
                state.clone(),
                metrics.clone(),
                best_hash.clone(),
                controller_tx.clone(),
            ));
        } else {
            io_workers.extend((0..config.io_workers.max(1)).map(|_| {
                IoWorker::spawn(
                    IoWorkerConfig { consult_data_index: config.consult_data_index },
                    collaborators.chunk_store.clone(),
                    collaborators.data_index.clone(),
                    io_session.clone(),
                    metrics.clone(),
                )
            }));

            for _ in 0..config.stage_two_workers.max(1) {
                stage_two_workers.push(StageTwoWorker::spawn(
                    hasher.clone(),
                    state.clone(),
                    metrics.clone(),
                    best_hash.clone(),
                    controller_tx.clone(),
                ));
            }

            let io_dispatcher: Arc<dyn IoDispatcher> =
                Arc::new(RoundRobinIoDispatcher::new(io_workers.iter().map(|w| w.inbox()).collect()));
            let stage_two_dispatcher: Arc<dyn StageTwoDispatcher> = Arc::new(RoundRobinStageTwoDispatcher::new(
                stage_two_workers.iter().map(|w| w.inbox()).collect(),
            ));

            for _ in 0..config.stage_one_workers.max(1) {
                stage_one_workers.push(StageOneWorker::spawn(
                    StageOneConfig { batch_iterations: config.batch_iterations },
                    hasher.clone(),
                    state.clone(),
                    metrics.clone(),
                    io_dispatcher.clone(),
                    stage_two_dispatcher.clone(),
                ));
            }
        }

        Self {
            config,
            refresher,
            hasher,
            metrics,
            best_hash,
            history,
            state,
            io_session,
            bds_base: outcome.bds_base,
            upper_bound,
            io_workers,
            stage_one_workers,
            stage_two_workers,
            small_weave_worker,
            controller_tx,
            collaborators,
            controller_rx,
        }
    }

    pub fn metrics(&self) -> Arc<MiningMetrics> {
        self.metrics.clone()
    }

    pub fn best_hash(&self) -> Arc<BestHashRegister> {
        self.best_hash.clone()
    }

    /// A sender other components (e.g. a network stop signal) can use to
    /// inject a stop without the controller needing to know about them.
    pub fn controller_sender(&self) -> Sender<ControllerMessage> {
        self.controller_tx.clone()
    }

    /// Runs the `Running` loop until a solution validates or `stop_rx` fires
    /// (SPEC_FULL.md §4.7). `now_secs` is sampled by the caller on each
    /// iteration so the controller never calls a forbidden-in-tests wall
    /// clock primitive directly.
    pub fn run(mut self, stop_rx: Receiver<()>, mut now_secs: impl FnMut() -> u64) -> RoundResult {
        let mut last_finalize_duration = Duration::ZERO;
        let mut refresh_timer = after(self.refresh_interval(last_finalize_duration));
        let controller_rx = self.controller_rx.clone();

        loop {
            select! {
                recv(stop_rx) -> _ => {
                    self.shutdown();
                    return RoundResult::Stopped;
                }
                recv(controller_rx) -> msg => {
                    match msg {
                        Ok(ControllerMessage::Solution(solution)) => {
                            if let Some(complete) = self.try_validate(solution) {
                                self.shutdown();
                                return RoundResult::Complete(complete);
                            }
                        }
                        Err(_) => {
                            // Every worker sender dropped: treat as a crash (SPEC_FULL.md §7 "Worker crash").
                            log::error!("all mining worker channels closed unexpectedly");
                            self.shutdown();
                            return RoundResult::Stopped;
                        }
                    }
                }
                recv(refresh_timer) -> _ => {
                    let ts = now_secs();
                    let outcome = self.refresher.partial_refresh(
                        &self.current_candidate(),
                        &self.bds_base,
                        &self.history,
                        last_finalize_duration,
                        ts,
                    );
                    last_finalize_duration = outcome.finalize_duration;
                    self.apply_refresh(outcome);
                    refresh_timer = after(self.refresh_interval(last_finalize_duration));
                }
            }
        }
    }

    fn refresh_interval(&self, last_finalize_duration: Duration) -> Duration {
        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        match interval.checked_sub(last_finalize_duration) {
            Some(remaining) if remaining > Duration::ZERO => remaining,
            _ => {
                log::warn!("BDS finalization exceeded the refresh interval, delivering refresh immediately");
                Duration::from_millis(1)
            }
        }
    }

    fn current_candidate(&self) -> CandidateBlock {
        self.history
            .latest_timestamp()
            .and_then(|ts| self.history.get(ts))
            .map(|(c, _)| c.clone())
            .expect("history always has at least the starting candidate")
    }

    fn apply_refresh(&mut self, outcome: crate::refresher::RefreshOutcome) {
        self.history.insert(outcome.candidate.clone(), outcome.bds.clone());

        let session = self.state.read().expect("mining state lock poisoned").session;
        let update = UpdateState {
            timestamp: outcome.candidate.timestamp,
            diff: outcome.candidate.diff,
            bds: Arc::new(outcome.bds.as_bytes().to_vec()),
            prev_h: self.state.read().expect("mining state lock poisoned").prev_h,
            upper_bound: self.upper_bound,
            session: session.token,
        };
        apply_update(&self.state, &update);
        *self.io_session.write().expect("session lock poisoned") =
            Session { token: session.token, timestamp: outcome.candidate.timestamp };
    }

    /// `Running -> Validating`: look up the candidate, retrieve the PoA, and
    /// re-derive/check the solution (SPEC_FULL.md §4.7, §4.8, §4.9). Returns
    /// `Some` only on acceptance.
    fn try_validate(&mut self, solution: spora_types::Solution) -> Option<WorkComplete> {
        let current_session = self.state.read().expect("mining state lock poisoned").session;
        if solution.session != current_session.token {
            return None;
        }

        let Some((candidate, bds)) = self.history.get(solution.timestamp).cloned() else {
            log::debug!("solution references a timestamp outside the candidate history, dropping");
            return None;
        };

        let prev_h = self.state.read().expect("mining state lock poisoned").prev_h;

        let poa = match derive_recall_byte(&solution.h0, &prev_h, self.upper_bound) {
            Err(RecallByteError::WeaveTooSmall) => PoaData::empty(),
            Ok(recall_byte) => match self.collaborators.poa_store.get_poa_from_v2_index(recall_byte) {
                Some(poa) => poa,
                None => {
                    log::warn!("no PoA available at solution time for recall byte {recall_byte}, discarding solution");
                    return None;
                }
            },
        };

        let request = ValidationRequest {
            bds: bds.as_bytes(),
            nonce: solution.nonce,
            timestamp: solution.timestamp,
            diff: candidate.diff,
            prev_h,
            upper_bound: self.upper_bound,
            poa: &poa,
            block_index: self.collaborators.block_index.as_ref(),
        };

        match validate_solution(self.hasher.as_ref(), self.collaborators.poa_validator.as_ref(), &request) {
            Ok(solution_hash) => {
                let current_block_hash = compute_block_hash(bds.as_bytes(), &solution_hash, &solution.nonce, &poa);
                Some(WorkComplete {
                    current_block_hash,
                    final_block: candidate,
                    mined_txs: vec![],
                    bds: bds.as_bytes().to_vec(),
                    poa,
                })
            }
            Err(err) => {
                log::error!(
                    "invalid solution: {err} (height={}, ts={}, nonce={:02x?})",
                    candidate.height,
                    solution.timestamp,
                    solution.nonce
                );
                None
            }
        }
    }

    /// `Running -> Stopped`: invalidate the session and terminate every
    /// worker (SPEC_FULL.md §4.7, §5 "Cancellation").
    fn shutdown(self) {
        let fresh_token = SessionToken::new();
        {
            let mut state = self.state.write().expect("mining state lock poisoned");
            state.session.token = fresh_token;
        }
        {
            let mut session = self.io_session.write().expect("session lock poisoned");
            session.token = fresh_token;
        }

        // Stop every worker pool concurrently rather than joining each thread
        // one at a time: a one-shot parallel-over-slice job, the kind the
        // reference workspace's `vdf` crate reaches for `rayon` to do
        // (SPEC_FULL.md §10 "Concurrency").
        let stage_one = self.stage_one_workers;
        let stage_two = self.stage_two_workers;
        let io_workers = self.io_workers;
        rayon::scope(|s| {
            s.spawn(|_| stage_one.into_par_iter().for_each(|worker| worker.stop()));
            s.spawn(|_| stage_two.into_par_iter().for_each(|worker| worker.stop()));
            s.spawn(|_| io_workers.into_par_iter().for_each(|worker| worker.stop()));
        });
        if let Some(worker) = self.small_weave_worker {
            worker.stop();
        }

        log::info!(
            "mining session stopped: {} sporas, {} kib fetched, hashrate {:.1} h/s",
            self.metrics.sporas.load(Ordering::Relaxed),
            self.metrics.kibs.load(Ordering::Relaxed),
            self.metrics.hashrate()
        );
    }
}

/// Combines the finalized BDS, the accepted solution hash, the winning nonce
/// and the PoA into the block's independent hash. The reference network's
/// exact `indep_hash` recipe is a block-serialization concern out of scope
/// for this core (SPEC_FULL.md §1); this is a placeholder combiner recorded
/// as an open question in DESIGN.md.
fn compute_block_hash(bds: &[u8], solution_hash: &[u8; 32], nonce: &[u8; 32], poa: &PoaData) -> spora_types::H384 {
    let mut preimage = Vec::with_capacity(bds.len() + 32 + 32 + poa.chunk.len());
    preimage.extend_from_slice(bds);
    preimage.extend_from_slice(solution_hash);
    preimage.extend_from_slice(nonce);
    preimage.extend_from_slice(poa.chunk.as_slice());

    let first = sha256(&preimage);
    let second = sha256(&first);
    let mut bytes = [0u8; 48];
    bytes[..32].copy_from_slice(&first);
    bytes[32..].copy_from_slice(&second[..16]);
    spora_types::H384::from_slice(&bytes)
}

/// Session-level integration tests exercising SPEC_FULL.md §8's concrete
/// scenarios end to end, rather than unit-testing one collaborator at a time.
#[cfg(test)]
mod tests {
    use super::*;
    use spora_store::Chunk;
    use spora_types::{H256, H384, U256};
    use std::collections::HashMap;

    struct NoTxPool;
    impl TxReplayPool for NoTxPool {
        fn pick(&self, _anchors: &[H256], _height: u64, _diff: U256, _timestamp: u64) -> Vec<H256> {
            vec![]
        }
        fn data_size(&self, _tx_ids: &[H256]) -> u64 {
            0
        }
    }

    struct StaticWalletStore;
    impl WalletStore for StaticWalletStore {
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

    struct FlatRetarget;
    impl RetargetModule for FlatRetarget {
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

    struct ZeroRewardPolicy;
    impl RewardPolicy for ZeroRewardPolicy {
        fn compute(&self, _current: &CandidateBlock, _block_size: u64, _timestamp: u64) -> (u64, u64) {
            (0, 0)
        }
    }

    struct EmptyTxRootBuilder;
    impl TxRootBuilder for EmptyTxRootBuilder {
        fn root(&self, _tx_ids: &[H256]) -> H256 {
            H256::zero()
        }
    }

    struct EmptyChunkStore;
    impl ChunkStore for EmptyChunkStore {
        fn get(&self, _byte_offset: u128) -> Option<Chunk> {
            None
        }
    }

    struct AlwaysEmptyPoaStore;
    impl PoaStore for AlwaysEmptyPoaStore {
        fn get_poa_from_v2_index(&self, _recall_byte: u128) -> Option<PoaData> {
            Some(PoaData::empty())
        }
    }

    struct AcceptingPoaValidator;
    impl PoaValidator for AcceptingPoaValidator {
        fn validate(&self, _recall_byte: u128, _block_index: &dyn BlockIndex, _poa: &PoaData) -> bool {
            true
        }
    }

    struct TestBlockIndex;
    impl BlockIndex for TestBlockIndex {}

    fn test_collaborators() -> Collaborators {
        Collaborators {
            tx_pool: Arc::new(NoTxPool),
            wallet_store: Arc::new(StaticWalletStore),
            retarget: Arc::new(FlatRetarget),
            reward_policy: Arc::new(ZeroRewardPolicy),
            tx_root_builder: Arc::new(EmptyTxRootBuilder),
            chunk_store: Arc::new(EmptyChunkStore),
            data_index: None,
            poa_store: Arc::new(AlwaysEmptyPoaStore),
            poa_validator: Arc::new(AcceptingPoaValidator),
            block_index: Arc::new(TestBlockIndex),
        }
    }

    fn genesis_block(diff: U256) -> CandidateBlock {
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
            timestamp: 1_700_000_000,
            last_retarget: 1_700_000_000,
            diff,
            cumulative_diff: U256::zero(),
            reward_pool: 0,
        }
    }

    /// A config with every pool at its minimum and a refresh interval long
    /// enough that the timer never fires during a short-lived test.
    fn test_config() -> MinerConfig {
        MinerConfig {
            stage_one_workers: 1,
            stage_two_workers: 1,
            io_workers: 1,
            batch_iterations: 64,
            refresh_interval_secs: 3600,
            subspaces: SPORA_SEARCH_SPACE_SUBSPACES_COUNT,
            consult_data_index: false,
        }
    }

    /// S1/S4 — an empty weave (`upper_bound == 0`) always routes to the
    /// small-weave worker, and a difficulty of zero clears on the first hash
    /// attempted. Expect a `WorkComplete` almost immediately, carrying an
    /// empty PoA (SPEC_FULL.md §8 scenarios S1, S4).
    #[test]
    fn small_weave_session_finds_a_solution_with_empty_poa() {
        let session = MiningSession::start(
            test_config(),
            test_collaborators(),
            b"test-key",
            genesis_block(U256::zero()),
            0,
            1_700_000_000,
        );

        let (_stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        match session.run(stop_rx, || 1_700_000_000) {
            RoundResult::Complete(work_complete) => {
                assert!(work_complete.poa.is_empty());
                assert_eq!(work_complete.final_block.height, 1);
            }
            RoundResult::Stopped => panic!("expected a solution, session stopped instead"),
        }
    }

    /// S3 — an unreachable difficulty never yields a solution; the controller
    /// must stay alive until an explicit `Stop`, then terminate promptly
    /// (SPEC_FULL.md §8 scenario S3).
    #[test]
    fn stop_terminates_a_session_that_never_finds_a_solution() {
        let session = MiningSession::start(
            test_config(),
            test_collaborators(),
            b"test-key",
            genesis_block(U256::max_value()),
            0,
            1_700_000_000,
        );

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<RoundResult>(1);
        let handle = std::thread::spawn(move || {
            let result = session.run(stop_rx, || 1_700_000_000);
            let _ = done_tx.send(result);
        });

        assert!(
            done_rx.recv_timeout(Duration::from_millis(300)).is_err(),
            "session finished before Stop was sent"
        );

        stop_tx.send(()).expect("stop channel is open");
        let result = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("session did not stop within 3s of Stop");
        assert!(matches!(result, RoundResult::Stopped));
        handle.join().expect("controller thread panicked");
    }

    /// S6 — a `Solution` tagged with a session token from a prior round must
    /// never produce a `WorkComplete` (SPEC_FULL.md §8 scenario S6).
    #[test]
    fn stale_session_token_solution_is_rejected() {
        let session = MiningSession::start(
            test_config(),
            test_collaborators(),
            b"test-key",
            genesis_block(U256::max_value()),
            0,
            1_700_000_000,
        );

        let controller_tx = session.controller_sender();
        let stale = spora_types::Solution {
            session: SessionToken::new(),
            nonce: [0u8; 32],
            h0: [0u8; 32],
            timestamp: 1_700_000_000,
            solution_hash: [0xffu8; 32],
        };
        controller_tx
            .send(ControllerMessage::Solution(stale))
            .expect("controller inbox is open");

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<RoundResult>(1);
        let handle = std::thread::spawn(move || {
            let result = session.run(stop_rx, || 1_700_000_000);
            let _ = done_tx.send(result);
        });

        // Give the controller time to process the stale solution before
        // confirming it did *not* terminate the round.
        assert!(
            done_rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "stale solution incorrectly completed the round"
        );

        stop_tx.send(()).expect("stop channel is open");
        let result = done_rx.recv_timeout(Duration::from_secs(3)).expect("session did not stop");
        assert!(matches!(result, RoundResult::Stopped));
        handle.join().expect("controller thread panicked");
    }
}
