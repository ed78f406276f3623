#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors raised while probing or downloading from an upstream.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Net(#[from] aulos_net::NetError),

    #[error("Upstream status {status}: {body:?}")]
    UpstreamStatus { status: u16, body: Option<String> },

    #[error("Download session aborted")]
    Aborted,
}

pub type FetchResult<T> = Result<T, FetchError>;
