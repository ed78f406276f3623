//! # aulos-fetch
//!
//! The downloader core of the aulos media proxy: upstream probe, header
//! cache, parameter resolution and the parallel segmented downloader.
//!
//! One client Range request becomes one [`DownloadSession`]. A pool of
//! workers claims chunk intervals under the session's planner mutex,
//! enqueues each chunk on a bounded FIFO *before* fetching it, and fills
//! the chunk's payload slot in place. Because offset assignment and
//! enqueueing happen atomically, the queue is globally ordered by offset
//! and the single reader emits a contiguous byte stream into the
//! client-facing pipe.
//!
//! Backpressure is byte-budgeted: while the queue holds at least
//! `max_buffered_chunks * chunk_size` bytes worth of chunks, workers pause
//! before fetching, capping in-flight payload memory per session.
//!
//! Any participant can end the session by calling
//! [`DownloadSession::stop`]; the reader then drains the queue (bounded by
//! an idle timeout) and closes the pipe. Truncation is the only failure
//! signal after the response has been committed.

#![forbid(unsafe_code)]

pub mod cache;
pub mod chunk;
pub mod downloader;
pub mod error;
pub mod headers;
pub mod params;
pub mod probe;
pub mod session;

pub use cache::HeaderCache;
pub use chunk::Chunk;
pub use downloader::run;
pub use error::{FetchError, FetchResult};
pub use headers::filter_request_headers;
pub use params::{DEFAULT_CHUNK_SIZE, MAX_BUFFER_BYTES, ParamHints, SessionParams};
pub use probe::{PROBE_WINDOW, ProbeOutcome, probe};
pub use session::{DownloadSession, SessionConfig};
