//! Process-wide mining counters and the best-hash register.
//!
//! Reimagined, per SPEC_FULL.md §9, as a small struct of atomics owned by the
//! controller and shared read-only with workers, rather than a global table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Counters updated by workers across the lifetime of a mining session.
#[derive(Debug)]
pub struct MiningMetrics {
    /// Number of solution-hash attempts (stage-two + small-weave).
    pub sporas: AtomicU64,
    /// KiB of chunk data fetched by I/O workers.
    pub kibs: AtomicU64,
    /// Number of recall bytes derived by stage-one workers.
    pub recall_bytes_computed: AtomicU64,
    started_at: Instant,
}

impl Default for MiningMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MiningMetrics {
    pub fn new() -> Self {
        Self {
            sporas: AtomicU64::new(0),
            kibs: AtomicU64::new(0),
            recall_bytes_computed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_hash_attempt(&self) {
        self.sporas.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_fetch(&self, chunk_size_bytes: u64) {
        self.kibs.fetch_add(chunk_size_bytes / 1024, Ordering::Relaxed);
    }

    pub fn record_recall_bytes(&self, count: u64) {
        self.recall_bytes_computed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Hashes attempted per second since the session started.
    pub fn hashrate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.sporas.load(Ordering::Relaxed) as f64 / elapsed
    }
}

/// The round's best near-miss solution hash, updated monotonically in
/// "closer to solution" order (i.e. numerically closer to clearing `diff`).
/// A plain `Mutex<[u8; 32]>` rather than a lock-free compare-and-swap loop
/// over a 32-byte value, since there is no atomic wide enough to CAS directly
/// and updates are rare relative to the hashing hot loop that feeds them.
#[derive(Debug)]
pub struct BestHashRegister {
    best: Mutex<[u8; 32]>,
}

impl Default for BestHashRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl BestHashRegister {
    pub fn new() -> Self {
        Self { best: Mutex::new([0u8; 32]) }
    }

    /// Updates the register iff `candidate` is numerically closer to clearing
    /// the difficulty target than the current best, i.e. `candidate > current`
    /// when both are read as big-endian 256-bit integers.
    pub fn update_if_closer(&self, candidate: &[u8; 32]) {
        let mut best = self.best.lock().expect("best-hash register poisoned");
        if candidate.as_slice() > best.as_slice() {
            *best = *candidate;
        }
    }

    pub fn current(&self) -> [u8; 32] {
        *self.best.lock().expect("best-hash register poisoned")
    }
}
