use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::{
    error::{NetError, NetResult},
    types::{NetResponse, RangeSpec},
};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send>>;

/// An upstream response whose body has not been buffered.
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

/// The network seam every upstream interaction goes through.
///
/// A 2xx/3xx status is treated as success; anything else becomes
/// [`NetError::HttpStatus`] with the body text attached, so callers can
/// propagate the upstream's own words.
#[async_trait]
pub trait Net: Send + Sync {
    /// GET with a `Range` header, body fully buffered.
    async fn get_ranged(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<HeaderMap>,
    ) -> NetResult<NetResponse>;

    /// GET returning the response head plus the unread body stream.
    async fn get_streaming(
        &self,
        url: Url,
        range: Option<RangeSpec>,
        headers: Option<HeaderMap>,
    ) -> NetResult<StreamingResponse>;

    /// Arbitrary-method request with an optional body, fully buffered.
    async fn request(
        &self,
        method: Method,
        url: Url,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
    ) -> NetResult<NetResponse>;
}
