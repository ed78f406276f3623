//! # aulos-proxy
//!
//! The HTTP surface of the aulos media proxy. A single route carries the
//! whole API: `GET /` with no query serves the embedded index page,
//! `GET /?url=…` proxies a media resource through the segmented
//! downloader, and every other method is relayed to the target URL
//! verbatim.

#![forbid(unsafe_code)]

pub mod app;
pub mod error;
pub mod handlers;
pub mod query;

pub use app::{AppState, router};
pub use error::ProxyError;
