//! Chunk store collaborator boundary and the I/O worker pool that fetches
//! recall-byte chunks for the mining core (SPEC_FULL.md §4.2).

pub mod chunk;
pub mod worker;

pub use chunk::{chunk_size_kib, expected_chunk_size, Chunk, ChunkStore, DataIndex};
pub use worker::{FetchRequest, FetchedChunk, IoMessage, IoWorker, IoWorkerConfig};
