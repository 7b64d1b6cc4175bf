//! Mining configuration (SPEC_FULL.md §10 "Configuration"). A plain struct
//! constructed programmatically or from environment variables with direct
//! `std::env::var` parsing, matching the reference workspace's unframed
//! configuration style — no config-file crate appears anywhere in it.

use spora_types::consensus::{
    MINING_TIMESTAMP_REFRESH_INTERVAL, SPORA_SEARCH_SPACE_SUBSPACES_COUNT,
};

/// Thread counts and tunables for one mining session (SPEC_FULL.md §5
/// "Worker topology").
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// Number of stage-one (bulk RandomX hashing) workers.
    pub stage_one_workers: usize,
    /// Number of stage-two (solution hashing) workers.
    pub stage_two_workers: usize,
    /// Number of I/O workers, typically one per storage spindle/partition.
    pub io_workers: usize,
    /// Nonces hashed per stage-one batch before checking for an update.
    pub batch_iterations: u64,
    /// Seconds between candidate timestamp refreshes.
    pub refresh_interval_secs: u64,
    /// Number of recall-byte subspaces (protocol constant, rarely overridden).
    pub subspaces: u32,
    /// Whether I/O workers fall back to the secondary data index on a miss.
    pub consult_data_index: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        // Reserve one core for the controller and I/O dispatch (SPEC_FULL.md §5).
        let workers = cores.saturating_sub(1).max(2);
        let stage_two_workers = (workers / 4).max(1);
        let stage_one_workers = (workers - stage_two_workers).max(1);
        Self {
            stage_one_workers,
            stage_two_workers,
            io_workers: 2,
            batch_iterations: 1024,
            refresh_interval_secs: MINING_TIMESTAMP_REFRESH_INTERVAL,
            subspaces: SPORA_SEARCH_SPACE_SUBSPACES_COUNT,
            consult_data_index: true,
        }
    }
}

impl MinerConfig {
    /// Overlays environment-variable overrides onto [`MinerConfig::default`].
    /// Unset or unparsable variables leave the default untouched, matching the
    /// reference's direct, unframed `std::env::var` style.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("SPORA_STAGE_ONE_WORKERS") {
            config.stage_one_workers = v;
        }
        if let Some(v) = env_usize("SPORA_STAGE_TWO_WORKERS") {
            config.stage_two_workers = v;
        }
        if let Some(v) = env_usize("SPORA_IO_WORKERS") {
            config.io_workers = v;
        }
        if let Some(v) = env_u64("SPORA_BATCH_ITERATIONS") {
            config.batch_iterations = v;
        }
        if let Some(v) = env_u64("SPORA_REFRESH_INTERVAL_SECS") {
            config.refresh_interval_secs = v;
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
