//! Shared state of one client-initiated download.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use http::HeaderMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::{chunk::Chunk, params::SessionParams};

/// Inputs fixed for the lifetime of a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub url: Url,
    /// Already filtered client headers, forwarded on every segment fetch.
    pub headers: HeaderMap,
    /// Inclusive byte range owed to the client.
    pub range_start: u64,
    pub range_end: u64,
    pub params: SessionParams,
}

struct Planner {
    /// Offset of the next chunk yet to be planned; monotonically increasing.
    next_start: u64,
    /// Ready queue sender. Sending happens inside the planner critical
    /// section so the queue stays ordered by `start`.
    tx: mpsc::Sender<Arc<Chunk>>,
}

/// One client Range request being served.
///
/// Shared between the planner/worker pool and the ordered reader. The
/// planner mutex serializes offset assignment and enqueueing; everything
/// else is atomics.
pub struct DownloadSession {
    pub config: SessionConfig,
    running: AtomicBool,
    /// Next byte owed to the client; written only by the reader.
    current_offset: AtomicU64,
    planner: Mutex<Planner>,
}

impl DownloadSession {
    /// Create the session plus the receiving end of its ready queue.
    ///
    /// The queue capacity leaves one slot of headroom per planned worker on
    /// top of the buffer budget, which keeps the in-lock send infallible: a
    /// worker never plans a second chunk before fetching its first.
    #[must_use]
    pub fn new(config: SessionConfig) -> (Arc<Self>, mpsc::Receiver<Arc<Chunk>>) {
        let capacity = (config.params.max_buffered_chunks + config.params.planned_workers) as usize;
        let (tx, rx) = mpsc::channel(capacity);

        let session = Arc::new(Self {
            current_offset: AtomicU64::new(config.range_start),
            planner: Mutex::new(Planner {
                next_start: config.range_start,
                tx,
            }),
            running: AtomicBool::new(true),
            config,
        });
        (session, rx)
    }

    /// Claim the next chunk interval and enqueue it, or `None` when the
    /// range is fully planned.
    pub fn plan_next(&self) -> Option<Arc<Chunk>> {
        let mut planner = self.planner.lock();

        if planner.next_start > self.config.range_end {
            return None;
        }

        let start = planner.next_start;
        let end = (start + self.config.params.chunk_size - 1).min(self.config.range_end);
        let chunk = Arc::new(Chunk::new(start, end));

        if planner.tx.try_send(Arc::clone(&chunk)).is_err() {
            // Capacity headroom makes this unreachable in a healthy session;
            // a full or closed queue means the session is tearing down.
            debug!(start, "ready queue rejected a planned chunk");
            self.stop();
            return None;
        }
        planner.next_start = end + 1;

        Some(chunk)
    }

    /// Bytes currently held (planned or fetched) in the ready queue,
    /// counted in whole chunks.
    #[must_use]
    pub fn queued_bytes(&self) -> u64 {
        let planner = self.planner.lock();
        let queued = planner.tx.max_capacity() - planner.tx.capacity();
        queued as u64 * self.config.params.chunk_size
    }

    /// Hard ceiling for [`queued_bytes`](Self::queued_bytes) before workers
    /// pause fetching.
    #[must_use]
    pub fn buffer_budget(&self) -> u64 {
        self.config.params.buffer_budget()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request teardown. Idempotent; workers and the reader observe the flag
    /// at their next suspension point.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!(url = %self.config.url, "download session stopping");
        }
    }

    #[must_use]
    pub fn current_offset(&self) -> u64 {
        self.current_offset.load(Ordering::Acquire)
    }

    pub(crate) fn advance_offset(&self, bytes: u64) {
        self.current_offset.fetch_add(bytes, Ordering::AcqRel);
    }
}
