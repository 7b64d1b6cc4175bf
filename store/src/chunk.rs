//! The chunk store and secondary data-index collaborator boundaries
//! (SPEC_FULL.md §6). Persistence, RocksDB lookup and network replication are
//! out of scope for the mining core; this module only defines the interface
//! I/O workers call across.

use spora_types::consensus::DATA_CHUNK_SIZE;

pub type Chunk = Vec<u8>;

/// The primary on-disk chunk store, keyed by absolute byte offset into the
/// weave. A real implementation lives outside this crate (RocksDB-backed, per
/// SPEC_FULL.md §1); this trait is the seam the I/O worker depends on.
pub trait ChunkStore: Send + Sync {
    fn get(&self, byte_offset: u128) -> Option<Chunk>;
}

/// Secondary fallback consulted on a chunk-store miss, gated by
/// [`crate::worker::IoWorkerConfig::consult_data_index`].
pub trait DataIndex: Send + Sync {
    fn get(&self, byte_offset: u128) -> Option<Chunk>;
}

/// Chunk size in KiB, used by I/O workers to account fetched bytes into
/// [`spora_types::MiningMetrics::kibs`].
pub fn chunk_size_kib(chunk: &Chunk) -> u64 {
    chunk.len() as u64 / 1024
}

/// The fixed chunk size the weave is sharded into.
pub fn expected_chunk_size() -> u32 {
    DATA_CHUNK_SIZE
}
