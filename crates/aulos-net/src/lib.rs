//! HTTP client layer for aulos.
//!
//! Wraps `reqwest` behind the [`Net`] trait: ranged GETs for segment
//! fetches and probes, streaming GETs for direct body relay, and
//! arbitrary-method requests for the pass-through relay. Cookie jars are
//! per session via [`HttpClient::with_cookie_jar`]; a `--dns` style
//! resolver override is applied at client build time.

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
mod resolve;
pub mod traits;
pub mod types;

pub use client::HttpClient;
pub use error::{NetError, NetResult};
pub use traits::{ByteStream, Net, StreamingResponse};
pub use types::{NetOptions, NetResponse, RangeSpec, RetryPolicy};
