//! The solution validator (SPEC_FULL.md §4.9) and the PoA collaborator traits
//! it delegates to (SPEC_FULL.md §4.8, §6). Mirrors the shape of
//! `pre_validate_block` / `quick_pow_is_valid` in the reference workspace's
//! `validator` crate, adapted to the subspace recall-byte formula instead of
//! the VDF/partition one.

use crate::hash::{clears_difficulty, compute_h0, compute_solution_hash, FastHasher};
use crate::recall::{derive_recall_byte, RecallByteError};
use spora_types::{PoaData, U256};

/// Chunk storage addressed by block height, standing in for the external
/// block index the reference network's PoA validator consults (SPEC_FULL.md §6).
pub trait BlockIndex: Send + Sync {}

/// Validates a `PoaData` against a recall byte and block index. Re-derivation
/// of the Merkle path is out of scope for the mining core (SPEC_FULL.md §1);
/// this crate only defines the boundary it is called across.
pub trait PoaValidator: Send + Sync {
    fn validate(&self, recall_byte: u128, block_index: &dyn BlockIndex, poa: &PoaData) -> bool;
}

/// Retrieves a PoA for a recall byte, used by the controller at solution time
/// (SPEC_FULL.md §4.8).
pub trait PoaStore: Send + Sync {
    fn get_poa_from_v2_index(&self, recall_byte: u128) -> Option<PoaData>;
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("solution hash does not clear the difficulty target")]
    DifficultyNotCleared,
    #[error("proof of access is non-empty but the weave is too small to support recall")]
    UnexpectedNonEmptyPoa,
    #[error("proof of access failed Merkle-path validation")]
    PoaRejected,
}

/// Inputs to the validator (SPEC_FULL.md §4.9).
pub struct ValidationRequest<'a> {
    pub bds: &'a [u8],
    pub nonce: [u8; 32],
    pub timestamp: u64,
    pub diff: U256,
    pub prev_h: [u8; 32],
    pub upper_bound: u128,
    pub poa: &'a PoaData,
    pub block_index: &'a dyn BlockIndex,
}

/// Re-derives and checks a claimed solution. Returns `Ok(solution_hash)` on
/// acceptance, `Err(ValidationError)` otherwise — every rejection path is
/// logged by the caller with full context (SPEC_FULL.md §7).
pub fn validate_solution(
    hasher: &FastHasher,
    poa_validator: &dyn PoaValidator,
    request: &ValidationRequest,
) -> Result<[u8; 32], ValidationError> {
    let h0 = compute_h0(hasher, &request.nonce, request.bds);
    let solution_hash = compute_solution_hash(
        hasher,
        &h0,
        &request.prev_h,
        request.timestamp,
        request.poa.chunk.as_slice(),
    );

    if !clears_difficulty(&solution_hash, &request.diff) {
        return Err(ValidationError::DifficultyNotCleared);
    }

    match derive_recall_byte(&h0, &request.prev_h, request.upper_bound) {
        Err(RecallByteError::WeaveTooSmall) => {
            if !request.poa.is_empty() {
                return Err(ValidationError::UnexpectedNonEmptyPoa);
            }
        }
        Ok(recall_byte) => {
            if !poa_validator.validate(recall_byte, request.block_index, request.poa) {
                return Err(ValidationError::PoaRejected);
            }
        }
    }

    Ok(solution_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptingBlockIndex;
    impl BlockIndex for AcceptingBlockIndex {}

    struct AcceptingPoaValidator;
    impl PoaValidator for AcceptingPoaValidator {
        fn validate(&self, _recall_byte: u128, _block_index: &dyn BlockIndex, _poa: &PoaData) -> bool {
            true
        }
    }

    struct RejectingPoaValidator;
    impl PoaValidator for RejectingPoaValidator {
        fn validate(&self, _recall_byte: u128, _block_index: &dyn BlockIndex, _poa: &PoaData) -> bool {
            false
        }
    }

    #[test]
    fn rejects_when_difficulty_not_cleared() {
        let hasher = FastHasher::new(b"test-key").expect("fast mode available");
        let block_index = AcceptingBlockIndex;
        let validator = AcceptingPoaValidator;
        let poa = PoaData::empty();
        let request = ValidationRequest {
            bds: b"some-bds",
            nonce: [7u8; 32],
            timestamp: 100,
            diff: U256::max_value(), // impossible to clear
            prev_h: [2u8; 32],
            upper_bound: 1 << 30,
            poa: &poa,
            block_index: &block_index,
        };
        assert_eq!(
            validate_solution(&hasher, &validator, &request),
            Err(ValidationError::DifficultyNotCleared)
        );
    }

    #[test]
    fn rejects_non_empty_poa_when_weave_too_small() {
        let hasher = FastHasher::new(b"test-key").expect("fast mode available");
        let block_index = AcceptingBlockIndex;
        let validator = AcceptingPoaValidator;
        let poa = PoaData { chunk: spora_types::Base64(vec![1, 2, 3]), ..PoaData::empty() };
        let request = ValidationRequest {
            bds: b"some-bds",
            nonce: [7u8; 32],
            timestamp: 100,
            diff: U256::zero(), // trivially cleared
            prev_h: [2u8; 32],
            upper_bound: 100, // weave too small: 100 / 1024 == 0
            poa: &poa,
            block_index: &block_index,
        };
        assert_eq!(
            validate_solution(&hasher, &validator, &request),
            Err(ValidationError::UnexpectedNonEmptyPoa)
        );
    }

    #[test]
    fn delegates_to_poa_validator_when_weave_is_large() {
        let hasher = FastHasher::new(b"test-key").expect("fast mode available");
        let block_index = AcceptingBlockIndex;
        let rejecting = RejectingPoaValidator;
        let poa = PoaData::empty();
        let request = ValidationRequest {
            bds: b"some-bds",
            nonce: [7u8; 32],
            timestamp: 100,
            diff: U256::zero(),
            prev_h: [2u8; 32],
            upper_bound: 1 << 34,
            poa: &poa,
            block_index: &block_index,
        };
        assert_eq!(
            validate_solution(&hasher, &rejecting, &request),
            Err(ValidationError::PoaRejected)
        );
    }
}
