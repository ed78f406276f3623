//! # aulos-pipe
//!
//! Bounded single-producer / single-consumer byte pipe bridging the
//! segmented downloader (writer) and the response pump (reader).
//!
//! ## Public contract
//!
//! - [`pipe`] — create a writer/reader pair with a bounded in-flight budget.
//! - [`PipeWriter::write`] — appends a block; waits while the pipe is at
//!   capacity; fails with `"closed pipe"` once the pipe is closed.
//! - [`PipeReader::read`] — next block, or an empty `Bytes` at
//!   end-of-stream.
//!
//! ## EOF semantics (normative)
//!
//! `read` returns empty **only** at end-of-stream: the pipe was closed and
//! the buffer is drained, or the writer was dropped and the buffer is
//! drained. Blocks written before `close` are never discarded.
//!
//! ## Close semantics (normative)
//!
//! `close` on either half is idempotent and unblocks both a writer waiting
//! for capacity and a reader waiting for data. The closed flag sits behind
//! a readers/writer lock; payload transfer itself goes through the
//! underlying channel and never takes that lock.

#![forbid(unsafe_code)]

pub mod errors;
pub mod pipe;

pub use errors::{PipeError, PipeResult};
pub use pipe::{PipeReader, PipeWriter, pipe};
