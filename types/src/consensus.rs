//! Wire-compatibility protocol constants.
//!
//! These must match the reference network bit-for-bit; none of them are tuning
//! knobs. See `helpers::consensus` in the reference workspace for the sibling
//! set this was extracted from (retarget/VDF/packing constants belonging to a
//! newer consensus era are not reproduced here, see SPEC_FULL.md §10).

/// Big-endian byte width of the timestamp field in the solution-hash preimage.
pub const TIMESTAMP_FIELD_SIZE_LIMIT: usize = 8;

/// Number of equal partitions ("subspaces") the eligible search space is split into.
pub const SPORA_SEARCH_SPACE_SUBSPACES_COUNT: u32 = 1024;

/// How many blocks back the recall-byte upper bound is pinned to, so a miner
/// cannot be made to prove possession of data it could not yet have synced.
pub const SEARCH_SPACE_UPPER_BOUND_DEPTH: u64 = 50;

/// Blocks the node is expected to retain without pruning (used to bound
/// candidate-history and chunk-store sizing, not enforced here directly).
pub const STORE_BLOCKS_BEHIND_CURRENT: u64 = 50;

/// Seconds between candidate-block timestamp refreshes while mining.
pub const MINING_TIMESTAMP_REFRESH_INTERVAL: u64 = 10;

/// Blocks between difficulty retargets.
pub const RETARGET_BLOCKS: u64 = 10;

/// Target average seconds per block.
pub const TARGET_TIME: u64 = 120;

pub const RETARGET_TOLERANCE_UPPER_BOUND: u64 = (TARGET_TIME * RETARGET_BLOCKS) + TARGET_TIME;
pub const RETARGET_TOLERANCE_LOWER_BOUND: u64 = (TARGET_TIME * RETARGET_BLOCKS) - TARGET_TIME;

pub const JOIN_CLOCK_TOLERANCE: u64 = 15;
pub const CLOCK_DRIFT_MAX: u64 = 5;

/// Adjustment applied when deriving a fresh difficulty from RandomX's hashrate
/// characteristics relative to the legacy SHA-256 hashing difficulty.
pub const RANDOMX_DIFF_ADJUSTMENT: u64 = 1;

pub const MIN_SPORA_DIFFICULTY: u64 = 2;

/// Fixed chunk size stored in the weave and fetched by I/O workers.
pub const DATA_CHUNK_SIZE: u32 = 256 * 1024;

/// Window, in seconds, that the candidate history retains past candidates for.
pub const CANDIDATE_HISTORY_WINDOW_SECS: u64 = 20;

/// Maximum age, in seconds, between a message's timestamp and the session's
/// current timestamp before I/O and stage-two workers drop it.
pub const STALE_MESSAGE_TOLERANCE_SECS: u64 = 19;

/// Idle tick used by I/O and stage-two workers to drain stale state.
pub const WORKER_IDLE_TICK_MS: u64 = 200;

/// How long mining refuses to start and retries when RandomX fast-mode state
/// is not yet available.
pub const RANDOMX_NOT_READY_RETRY_SECS: u64 = 10;

/// The fixed key RandomX's cache is initialized against for both packing and
/// mining fast-mode hashing.
pub const RANDOMX_PACKING_KEY: &[u8] = b"default arweave 2.5 pack key";
