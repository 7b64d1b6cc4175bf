//! The I/O worker pool (SPEC_FULL.md §4.2): fetches a recall-byte chunk from
//! the chunk store (falling back to the secondary data index), then forwards
//! it to the stage-two worker named in the request. Mirrors the reference
//! workspace's message-passing-free style only in spirit — the reference has
//! no long-lived worker pool to imitate directly, so the channel plumbing
//! here is grounded in SPEC_FULL.md §9's "Dynamic message dispatch" note
//! rather than in any single reference file.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use spora_types::candidate::SharedSession;
use spora_types::{MiningMetrics, SessionToken};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::chunk::{ChunkStore, DataIndex};

/// The 200 ms idle tick used to periodically drain stale state (SPEC_FULL.md §4.2, §5).
const IDLE_TICK: Duration = Duration::from_millis(spora_types::consensus::WORKER_IDLE_TICK_MS);

/// How far behind the session timestamp an incoming message's `ts` may lag
/// before it is considered stale (SPEC_FULL.md §5 "Timeouts").
const STALE_TOLERANCE_SECS: u64 = spora_types::consensus::STALE_MESSAGE_TOLERANCE_SECS;

/// A fetched chunk handed to a stage-two worker, carrying everything it needs
/// to compute the solution hash without a second round-trip to the session.
#[derive(Clone, Debug)]
pub struct FetchedChunk {
    pub chunk: Vec<u8>,
    pub h0: [u8; 32],
    pub nonce: [u8; 32],
    pub timestamp: u64,
    pub diff: spora_types::U256,
    pub session: SessionToken,
}

/// A recall-byte fetch request dispatched by a stage-one worker (SPEC_FULL.md §4.3).
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub byte_offset: u128,
    pub h0: [u8; 32],
    pub nonce: [u8; 32],
    pub timestamp: u64,
    pub diff: spora_types::U256,
    pub session: SessionToken,
    /// The stage-two worker's inbox to forward a hit to.
    pub stage_two: Sender<FetchedChunk>,
}

pub enum IoMessage {
    Fetch(FetchRequest),
    Stop,
}

/// Whether a miss on the primary chunk store falls through to the secondary
/// data index (SPEC_FULL.md §4.2: "if a configuration flag is set").
#[derive(Clone, Copy, Debug)]
pub struct IoWorkerConfig {
    pub consult_data_index: bool,
}

impl Default for IoWorkerConfig {
    fn default() -> Self {
        Self { consult_data_index: true }
    }
}

/// One I/O worker: an OS thread with its own inbox, holding the chunk store
/// and (optionally) the data index for its lifetime.
pub struct IoWorker {
    inbox: Sender<IoMessage>,
    handle: Option<JoinHandle<()>>,
}

impl IoWorker {
    /// Spawns the worker thread. `session` is the shared, lock-read handle
    /// published by the controller (SPEC_FULL.md §9 "Session map as
    /// process-wide table"); `metrics` is the process-wide atomic counter set.
    pub fn spawn(
        config: IoWorkerConfig,
        chunk_store: Arc<dyn ChunkStore>,
        data_index: Option<Arc<dyn DataIndex>>,
        session: SharedSession,
        metrics: Arc<MiningMetrics>,
    ) -> Self {
        let (tx, rx) = bounded::<IoMessage>(256);
        let handle = std::thread::Builder::new()
            .name("spora-io-worker".into())
            .spawn(move || run(config, chunk_store, data_index, session, metrics, rx))
            .expect("failed to spawn I/O worker thread");
        Self { inbox: tx, handle: Some(handle) }
    }

    pub fn inbox(&self) -> Sender<IoMessage> {
        self.inbox.clone()
    }

    /// Sends the stop signal and blocks until the worker thread has released
    /// its chunk-store handle and exited (SPEC_FULL.md §4.2, §5 "Cancellation").
    pub fn stop(mut self) {
        let _ = self.inbox.send(IoMessage::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    config: IoWorkerConfig,
    chunk_store: Arc<dyn ChunkStore>,
    data_index: Option<Arc<dyn DataIndex>>,
    session: SharedSession,
    metrics: Arc<MiningMetrics>,
    rx: Receiver<IoMessage>,
) {
    let ticker = crossbeam_channel::tick(IDLE_TICK);
    loop {
        select! {
            recv(rx) -> msg => {
                match msg {
                    Ok(IoMessage::Fetch(req)) => handle_fetch(&config, &*chunk_store, data_index.as_deref(), &session, &metrics, req),
                    Ok(IoMessage::Stop) | Err(_) => break,
                }
            }
            recv(ticker) -> _ => {
                // Nothing persistent to drain beyond what handle_fetch already
                // checks per-message; the tick exists so the worker never
                // blocks indefinitely on `rx` alone (SPEC_FULL.md §4.2).
            }
        }
    }
    // `chunk_store`/`data_index` Arcs drop here, releasing file handles.
}

fn handle_fetch(
    config: &IoWorkerConfig,
    chunk_store: &dyn ChunkStore,
    data_index: Option<&dyn DataIndex>,
    session: &SharedSession,
    metrics: &MiningMetrics,
    req: FetchRequest,
) {
    let current = *session.read().expect("session lock poisoned");
    if req.session != current.token {
        log::debug!("dropping fetch for byte {}: stale session token", req.byte_offset);
        return;
    }
    if req.timestamp + STALE_TOLERANCE_SECS < current.timestamp {
        log::debug!(
            "dropping fetch for byte {}: ts {} is more than {}s behind session ts {}",
            req.byte_offset,
            req.timestamp,
            STALE_TOLERANCE_SECS,
            current.timestamp
        );
        return;
    }

    let chunk = chunk_store.get(req.byte_offset).or_else(|| {
        if config.consult_data_index {
            data_index.and_then(|index| index.get(req.byte_offset))
        } else {
            None
        }
    });

    let Some(chunk) = chunk else {
        // Chunk miss: drop the nonce, no counter increment (SPEC_FULL.md §7).
        log::debug!("dropping fetch for byte {}: chunk miss", req.byte_offset);
        return;
    };

    metrics.record_chunk_fetch(chunk.len() as u64);

    let fetched = FetchedChunk {
        chunk,
        h0: req.h0,
        nonce: req.nonce,
        timestamp: req.timestamp,
        diff: req.diff,
        session: req.session,
    };
    let _ = req.stage_two.send(fetched);
}

#[cfg(test)]
mod tests {
    use super::*;
    use spora_types::candidate::{new_shared_session, Session};
    use spora_types::SessionToken;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MapChunkStore(Mutex<HashMap<u128, Vec<u8>>>);
    impl ChunkStore for MapChunkStore {
        fn get(&self, byte_offset: u128) -> Option<Vec<u8>> {
            self.0.lock().unwrap().get(&byte_offset).cloned()
        }
    }

    fn recv_with_timeout(rx: &Receiver<FetchedChunk>) -> Option<FetchedChunk> {
        rx.recv_timeout(Duration::from_secs(1)).ok()
    }

    #[test]
    fn delivers_chunk_on_hit_and_records_kibs() {
        let mut map = HashMap::new();
        map.insert(42u128, vec![0u8; 1024]);
        let store = Arc::new(MapChunkStore(Mutex::new(map)));
        let session_token = SessionToken::new();
        let session = new_shared_session(Session { token: session_token, timestamp: 1000 });
        let metrics = Arc::new(MiningMetrics::new());
        let worker = IoWorker::spawn(
            IoWorkerConfig::default(),
            store,
            None,
            session,
            metrics.clone(),
        );

        let (stage_two_tx, stage_two_rx) = bounded(1);
        let request = FetchRequest {
            byte_offset: 42,
            h0: [1u8; 32],
            nonce: [2u8; 32],
            timestamp: 1000,
            diff: spora_types::U256::zero(),
            session: session_token,
            stage_two: stage_two_tx,
        };
        worker.inbox().send(IoMessage::Fetch(request)).unwrap();

        let fetched = recv_with_timeout(&stage_two_rx).expect("chunk delivered");
        assert_eq!(fetched.chunk.len(), 1024);
        assert_eq!(metrics.kibs.load(std::sync::atomic::Ordering::Relaxed), 1);

        worker.stop();
    }

    #[test]
    fn drops_request_from_a_stale_session() {
        let store = Arc::new(MapChunkStore(Mutex::new(HashMap::new())));
        let current_token = SessionToken::new();
        let stale_token = SessionToken::new();
        let session = new_shared_session(Session { token: current_token, timestamp: 1000 });
        let metrics = Arc::new(MiningMetrics::new());
        let worker = IoWorker::spawn(IoWorkerConfig::default(), store, None, session, metrics);

        let (stage_two_tx, stage_two_rx) = bounded(1);
        let request = FetchRequest {
            byte_offset: 1,
            h0: [0u8; 32],
            nonce: [0u8; 32],
            timestamp: 1000,
            diff: spora_types::U256::zero(),
            session: stale_token,
            stage_two: stage_two_tx,
        };
        worker.inbox().send(IoMessage::Fetch(request)).unwrap();

        assert!(stage_two_rx.recv_timeout(Duration::from_millis(300)).is_err());
        worker.stop();
    }

    #[test]
    fn falls_back_to_data_index_on_primary_miss() {
        let store = Arc::new(MapChunkStore(Mutex::new(HashMap::new())));
        struct FallbackIndex;
        impl DataIndex for FallbackIndex {
            fn get(&self, _byte_offset: u128) -> Option<Vec<u8>> {
                Some(vec![9u8; 2048])
            }
        }
        let session_token = SessionToken::new();
        let session = new_shared_session(Session { token: session_token, timestamp: 1000 });
        let metrics = Arc::new(MiningMetrics::new());
        let worker = IoWorker::spawn(
            IoWorkerConfig { consult_data_index: true },
            store,
            Some(Arc::new(FallbackIndex)),
            session,
            metrics,
        );

        let (stage_two_tx, stage_two_rx) = bounded(1);
        let request = FetchRequest {
            byte_offset: 7,
            h0: [0u8; 32],
            nonce: [0u8; 32],
            timestamp: 1000,
            diff: spora_types::U256::zero(),
            session: session_token,
            stage_two: stage_two_tx,
        };
        worker.inbox().send(IoMessage::Fetch(request)).unwrap();

        let fetched = recv_with_timeout(&stage_two_rx).expect("fallback chunk delivered");
        assert_eq!(fetched.chunk.len(), 2048);
        worker.stop();
    }
}
