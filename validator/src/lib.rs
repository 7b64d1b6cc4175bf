//! Recall-byte derivation, RandomX hashing and SPoRA solution validation.
//!
//! This crate is the single source of truth for the recall-byte formula
//! (SPEC_FULL.md §4.1) and the solution-hash preimage (SPEC_FULL.md §6): both
//! the mining stage-two worker and the validator call into it, so they can
//! never drift apart (SPEC_FULL.md §8, invariant 3).

pub mod hash;
pub mod recall;
pub mod validate;

pub use hash::{compute_h0, compute_solution_hash, solution_preimage, FastHasher};
pub use recall::{derive_recall_byte, RecallByteError};
pub use validate::{validate_solution, BlockIndex, PoaStore, PoaValidator, ValidationError, ValidationRequest};
