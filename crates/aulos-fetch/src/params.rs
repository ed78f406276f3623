//! Session parameter resolution: worker count, chunk size, buffer budget.

pub const DEFAULT_CHUNK_SIZE: u64 = 128 * 1024;
pub const MAX_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

const GIB: u64 = 1024 * 1024 * 1024;
const SINGLE_WORKER_SPAN: u64 = 512 * 1024 * 1024;

/// Client-supplied overrides from the `thread` and `size` query parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParamHints {
    pub workers: Option<u64>,
    pub chunk_size: Option<u64>,
}

/// Resolved knobs for one download session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionParams {
    /// Bytes fetched per upstream Range request.
    pub chunk_size: u64,
    /// Requested worker count before clamping to the number of chunks.
    pub worker_count: u64,
    /// Ready-queue budget; `max_buffered_chunks * chunk_size` caps in-flight
    /// payload memory.
    pub max_buffered_chunks: u64,
    /// Workers actually spawned; never more than there are chunks to plan.
    pub planned_workers: u64,
}

impl SessionParams {
    #[must_use]
    pub fn resolve(hints: ParamHints, total_size: u64, range_start: u64, range_end: u64) -> Self {
        let chunk_size = hints
            .chunk_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE);

        let worker_count = match hints.workers {
            Some(workers) => workers.max(1),
            None if range_end.saturating_sub(range_start) <= SINGLE_WORKER_SPAN => 1,
            None if total_size < GIB => 16,
            None if total_size < 4 * GIB => 32,
            None => 64,
        };

        let span = range_end.saturating_sub(range_start) + 1;
        let max_buffered_chunks = (MAX_BUFFER_BYTES / chunk_size).max(1);
        let planned_workers = worker_count.min(span.div_ceil(chunk_size) + 1);

        Self {
            chunk_size,
            worker_count,
            max_buffered_chunks,
            planned_workers,
        }
    }

    /// Hard ceiling on buffered payload bytes for this session.
    #[must_use]
    pub fn buffer_budget(&self) -> u64 {
        self.max_buffered_chunks * self.chunk_size
    }
}
