//! Proof-of-access payload shape. Retrieval and Merkle-path validation of a
//! `PoaData` are external collaborators (see SPEC_FULL.md §6); this crate only
//! owns the shape of the data that crosses that boundary.

use crate::hashes::Base64;
use borsh::BorshDeserialize;
use borsh_derive::BorshDeserialize;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoaData {
    pub tx_path: Base64,
    pub data_path: Base64,
    pub chunk: Base64,
}

impl PoaData {
    /// The empty PoA, valid only when the recall-byte deriver reports that
    /// the weave is too small to support recall.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_path.is_empty() && self.data_path.is_empty() && self.chunk.is_empty()
    }
}

/// Fixed width of a Merkle proof's hash and offset fields, matching the
/// reference workspace's `validator::merkle::{HASH_SIZE, NOTE_SIZE}`.
const PROOF_HASH_SIZE: usize = 32;
const PROOF_NOTE_SIZE: usize = 32;

/// The final segment of a `tx_path`/`data_path`, describing the leaf (original
/// data chunk) node. Mirrors `validator::merkle::LeafProof` in the reference
/// workspace bit-for-bit so the same Borsh-encoded trailing bytes decode
/// identically; full path traversal and hash verification remain the external
/// `PoaValidator` collaborator's responsibility (SPEC_FULL.md §6).
#[repr(C)]
#[derive(BorshDeserialize, Debug, Clone, PartialEq)]
pub struct LeafProof {
    pub data_hash: [u8; PROOF_HASH_SIZE],
    pub notepad: [u8; PROOF_NOTE_SIZE - 8],
    pub offset: [u8; 8],
}

impl LeafProof {
    pub fn offset(&self) -> usize {
        usize::from_be_bytes(self.offset)
    }

    /// Decodes the trailing `LeafProof` segment of a `tx_path`/`data_path`.
    pub fn try_from_path_tail(path: &[u8]) -> Result<Self, std::io::Error> {
        Self::try_from_slice(path)
    }
}

/// An interior branch node: the hash of a pair of child nodes plus the split
/// offset between them. Mirrors `validator::merkle::BranchProof`.
#[derive(BorshDeserialize, Debug, Clone, PartialEq)]
pub struct BranchProof {
    pub left_id: [u8; PROOF_HASH_SIZE],
    pub right_id: [u8; PROOF_HASH_SIZE],
    pub notepad: [u8; PROOF_NOTE_SIZE - 8],
    pub offset: [u8; 8],
}

impl BranchProof {
    pub fn offset(&self) -> usize {
        usize::from_be_bytes(self.offset)
    }

    pub fn try_from_slice_at(slice: &[u8]) -> Result<Self, std::io::Error> {
        Self::try_from_slice(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_proof_decodes_offset_from_trailing_be_bytes() {
        let mut bytes = vec![0u8; PROOF_HASH_SIZE + (PROOF_NOTE_SIZE - 8)];
        bytes.extend_from_slice(&777u64.to_be_bytes());
        let leaf = LeafProof::try_from_path_tail(&bytes).expect("leaf proof decodes");
        assert_eq!(leaf.offset(), 777);
    }
}
