//! The recall-byte deriver (SPEC_FULL.md §4.1): a pure function mapping
//! `(H0, prevH, upper_bound)` to a byte offset inside the historical weave.
//! Must be byte-identical between the miner and the validator — there is
//! exactly one implementation of this module, shared by both call sites.

use openssl::sha::sha256;
use spora_types::consensus::SPORA_SEARCH_SPACE_SUBSPACES_COUNT;
use spora_types::U256;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallByteError {
    /// The weave is too small to support recall; miners fall back to the
    /// small-weave path (SPEC_FULL.md §4.5) and the empty PoA is valid.
    #[error("weave too small to support recall at the given upper bound")]
    WeaveTooSmall,
}

/// The fraction of the weave eligible for recall-byte search, as a function of
/// the upper bound. The base protocol makes the entire upper bound eligible;
/// this is kept as a free function (rather than inlined) so a narrower future
/// policy can replace it without touching the subspace arithmetic below
/// (see DESIGN.md, "recall-byte search-space policy").
pub fn search_space(upper_bound: u128) -> u128 {
    upper_bound
}

/// Minimal-width big-endian encoding of `n`, i.e. no leading zero byte, with a
/// single zero byte for `n == 0`. Matches Erlang's `binary:encode_unsigned/1`,
/// which the reference network uses when hashing the subspace number into the
/// search-subspace seed.
fn encode_be_varint(n: u64) -> Vec<u8> {
    if n == 0 {
        return vec![0];
    }
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap();
    bytes[first_nonzero..].to_vec()
}

/// Derives the recall byte for `(h0, prev_h, upper_bound)` per SPEC_FULL.md §4.1.
pub fn derive_recall_byte(
    h0: &[u8; 32],
    prev_h: &[u8; 32],
    upper_bound: u128,
) -> Result<u128, RecallByteError> {
    let subspaces = SPORA_SEARCH_SPACE_SUBSPACES_COUNT as u128;
    let search_space = self::search_space(upper_bound);
    let search_subspace_size = search_space / subspaces;
    if search_subspace_size == 0 {
        return Err(RecallByteError::WeaveTooSmall);
    }

    let h0_int = U256::from_big_endian(h0);
    let subspace_number = (h0_int % U256::from(subspaces)).as_u128();

    let even_subspace_size = upper_bound / subspaces;
    let subspace_start = subspace_number * even_subspace_size;
    let subspace_size = std::cmp::min(upper_bound - subspace_start, even_subspace_size);

    let mut seed_preimage = prev_h.to_vec();
    seed_preimage.extend_from_slice(&encode_be_varint(subspace_number as u64));
    let search_subspace_seed = U256::from_big_endian(&sha256(&seed_preimage));
    let search_subspace_start = (search_subspace_seed % U256::from(subspace_size)).as_u128();

    let search_subspace_byte =
        (U256::from_big_endian(&sha256(h0)) % U256::from(search_subspace_size)).as_u128();

    Ok(subspace_start + (search_subspace_start + search_subspace_byte) % subspace_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_byte_lies_within_upper_bound() {
        let h0 = [0x11u8; 32];
        let prev_h = [0x22u8; 32];
        let upper_bound: u128 = 1u128 << 34;
        let byte = derive_recall_byte(&h0, &prev_h, upper_bound).unwrap();
        assert!(byte < upper_bound);
    }

    #[test]
    fn recall_byte_is_deterministic() {
        let h0 = [0x01u8; 32];
        let prev_h = [0x02u8; 32];
        let upper_bound: u128 = 1u128 << 30;
        let a = derive_recall_byte(&h0, &prev_h, upper_bound).unwrap();
        let b = derive_recall_byte(&h0, &prev_h, upper_bound).unwrap();
        assert_eq!(a, b);
    }

    /// Golden vector (SPEC_FULL.md §8, scenario S5): fixed H0/prevH/upper_bound
    /// with the default 1024-subspace policy. `270520791` is the reference
    /// derivation's output for these inputs, computed independently of this
    /// module and pinned as a literal so a future refactor (e.g. a step-7
    /// divisor drifting from `search_subspace_size` to `subspace_size`, or
    /// vice versa) shows up as a test failure instead of silently
    /// recomputing the same bug the implementation has.
    #[test]
    fn recall_byte_matches_golden_vector() {
        let h0 = [0x01u8; 32];
        let prev_h = [0x02u8; 32];
        let upper_bound: u128 = 1u128 << 30;

        assert_eq!(derive_recall_byte(&h0, &prev_h, upper_bound).unwrap(), 270520791u128);
    }

    #[test]
    fn weave_too_small_when_upper_bound_below_subspace_count() {
        let h0 = [0x01u8; 32];
        let prev_h = [0x02u8; 32];
        // upper_bound / 1024 == 0
        let upper_bound: u128 = 100;
        assert_eq!(
            derive_recall_byte(&h0, &prev_h, upper_bound),
            Err(RecallByteError::WeaveTooSmall)
        );
    }
}
