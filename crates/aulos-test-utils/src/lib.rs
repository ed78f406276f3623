#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "test utility crate — unwraps are acceptable"
)]

//! Shared test utilities for the aulos workspace.

pub mod http_server;
pub mod rng;
pub mod upstream;

pub use http_server::TestHttpServer;
pub use rng::{Xorshift64, deterministic_body};
pub use upstream::{UpstreamOptions, UpstreamRecorder, media_router};
