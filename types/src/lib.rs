//! Core data model for the SPoRA mining core: the candidate block, the block
//! data segment, session tokens, protocol constants and shared metrics.
//!
//! Mirrors the role the reference workspace's `types` crate plays for the
//! whole node, scoped down to what the mining core and its validator need.

pub mod candidate;
pub mod consensus;
pub mod hashes;
pub mod metrics;
pub mod poa;

pub use candidate::{BlockDataSegment, CandidateBlock, Session, SessionToken, Solution, WorkComplete};
pub use hashes::{Base64, DecodeHash, H256, H384, U256};
pub use metrics::{BestHashRegister, MiningMetrics};
pub use poa::{BranchProof, LeafProof, PoaData};
