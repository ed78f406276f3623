use reqwest::Error as ReqwestError;
use thiserror::Error;
use url::Url;

pub type NetResult<T> = Result<T, NetError>;

/// Centralized error type for aulos-net.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Timeout")]
    Timeout,
    #[error("Request failed after {max_retries} retries: {source}")]
    RetryExhausted { max_retries: u32, source: Box<Self> },
    #[error("HTTP {status} for {url}: {body:?}")]
    HttpStatus {
        status: u16,
        url: Url,
        body: Option<String>,
    },
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl NetError {
    /// Checks if this error is considered retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(msg) => {
                msg.contains("timeout")
                    || msg.contains("connection")
                    || msg.contains("network")
                    || msg.contains("body")
            }
            Self::Timeout => true,
            Self::HttpStatus { status, .. } => {
                // Retry on 5xx server errors, 429 Too Many Requests, 408 Request Timeout
                *status >= 500 || *status == 429 || *status == 408
            }
            Self::RetryExhausted { .. } | Self::Build(_) => false,
        }
    }
}

impl From<ReqwestError> for NetError {
    fn from(e: ReqwestError) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        // Alternate formatting {:#} includes the full error chain
        // (e.g. "error sending request … : connection refused")
        Self::Http(format!("{e:#}"))
    }
}
