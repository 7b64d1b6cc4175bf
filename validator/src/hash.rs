//! RandomX fast-mode hashing and the solution-hash preimage layout
//! (SPEC_FULL.md §4.4, §6 "Hash wire format").
//!
//! The RandomX engine itself is an external collaborator (SPEC_FULL.md §6):
//! this module only shapes the calls into it the way the reference
//! workspace's `validator::block` module does for `compute_randomx_hash`.

use arweave_randomx_rs::{RandomXCache, RandomXFlag, RandomXVM};
use spora_types::consensus::TIMESTAMP_FIELD_SIZE_LIMIT;

/// A RandomX VM initialized in fast mode against a fixed packing key, held for
/// the lifetime of a mining session and reused across hash calls the way the
/// reference's `compute_mining_hash` builds and tears one down per call would
/// not afford at mining throughput.
pub struct FastHasher {
    vm: RandomXVM,
}

impl FastHasher {
    /// Builds a fast-mode VM from `key`. Returns `None` if only light-mode
    /// RandomX state is available (SPEC_FULL.md §7 "Not ready").
    pub fn new(key: &[u8]) -> Option<Self> {
        let flags = RandomXFlag::get_recommended_flags();
        let cache = RandomXCache::new(flags, key).ok()?;
        let vm = RandomXVM::new(flags, Some(cache), None).ok()?;
        Some(Self { vm })
    }

    /// `RandomX_fast(bytes) -> 32-byte hash`.
    pub fn hash(&self, input: &[u8]) -> [u8; 32] {
        self.vm
            .calculate_hash(input)
            .expect("randomx hash computation")
            .try_into()
            .expect("randomx hash is 32 bytes")
    }
}

/// Computes `H0 = RandomX_fast(nonce ‖ bds)`.
pub fn compute_h0(hasher: &FastHasher, nonce: &[u8; 32], bds: &[u8]) -> [u8; 32] {
    let mut input = Vec::with_capacity(32 + bds.len());
    input.extend_from_slice(nonce);
    input.extend_from_slice(bds);
    hasher.hash(&input)
}

/// Builds the solution-hash preimage `H0 ‖ prevH ‖ be_fixed(ts, TIMESTAMP_FIELD_SIZE_LIMIT) ‖ chunk`.
/// `chunk` is empty on the small-weave path.
pub fn solution_preimage(h0: &[u8; 32], prev_h: &[u8; 32], timestamp: u64, chunk: &[u8]) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(32 + 32 + TIMESTAMP_FIELD_SIZE_LIMIT + chunk.len());
    preimage.extend_from_slice(h0);
    preimage.extend_from_slice(prev_h);
    let ts_bytes = timestamp.to_be_bytes();
    debug_assert_eq!(ts_bytes.len(), TIMESTAMP_FIELD_SIZE_LIMIT);
    preimage.extend_from_slice(&ts_bytes);
    preimage.extend_from_slice(chunk);
    preimage
}

/// `solution_hash = RandomX_fast(H0 ‖ prevH ‖ be64(ts) ‖ chunk)`.
pub fn compute_solution_hash(
    hasher: &FastHasher,
    h0: &[u8; 32],
    prev_h: &[u8; 32],
    timestamp: u64,
    chunk: &[u8],
) -> [u8; 32] {
    hasher.hash(&solution_preimage(h0, prev_h, timestamp, chunk))
}

/// `be_uint_256(hash) > diff` — the linear-difficulty solution test.
pub fn clears_difficulty(solution_hash: &[u8; 32], diff: &spora_types::U256) -> bool {
    &spora_types::U256::from_big_endian(solution_hash) > diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preimage_layout_matches_wire_format() {
        let h0 = [1u8; 32];
        let prev_h = [2u8; 32];
        let chunk = vec![9u8; 4];
        let preimage = solution_preimage(&h0, &prev_h, 42, &chunk);
        assert_eq!(&preimage[0..32], &h0[..]);
        assert_eq!(&preimage[32..64], &prev_h[..]);
        assert_eq!(&preimage[64..72], &42u64.to_be_bytes());
        assert_eq!(&preimage[72..], &chunk[..]);
    }

    #[test]
    fn small_weave_preimage_has_empty_chunk_tail() {
        let h0 = [1u8; 32];
        let prev_h = [2u8; 32];
        let preimage = solution_preimage(&h0, &prev_h, 42, &[]);
        assert_eq!(preimage.len(), 32 + 32 + 8);
    }

    #[test]
    fn clears_difficulty_is_strict_greater_than() {
        let diff = spora_types::U256::from(100u64);
        let low = {
            let mut h = [0u8; 32];
            h[31] = 50;
            h
        };
        let equal = {
            let mut h = [0u8; 32];
            h[31] = 100;
            h
        };
        let high = {
            let mut h = [0u8; 32];
            h[31] = 200;
            h
        };
        assert!(!clears_difficulty(&low, &diff));
        assert!(!clears_difficulty(&equal, &diff));
        assert!(clears_difficulty(&high, &diff));
    }
}
