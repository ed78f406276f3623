use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::{HeaderMap, Method};
use reqwest::{Client, cookie::Jar};
use url::Url;

use crate::{
    error::{NetError, NetResult},
    resolve::OverrideResolver,
    traits::{Net, StreamingResponse},
    types::{NetOptions, NetResponse, RangeSpec},
};

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Self::builder(&options)
            .build()
            .map_err(|e| NetError::Build(format!("{e:#}")))?;
        Ok(Self { inner, options })
    }

    /// Client whose requests carry (and collect) cookies from `jar`.
    ///
    /// The jar is scoped to one proxy session; never share it across client
    /// requests.
    pub fn with_cookie_jar(options: NetOptions, jar: Arc<Jar>) -> NetResult<Self> {
        let inner = Self::builder(&options)
            .cookie_provider(jar)
            .build()
            .map_err(|e| NetError::Build(format!("{e:#}")))?;
        Ok(Self { inner, options })
    }

    fn builder(options: &NetOptions) -> reqwest::ClientBuilder {
        let mut builder =
            Client::builder().pool_max_idle_per_host(options.pool_max_idle_per_host);
        if let Some(server) = options.dns_server {
            builder = builder.dns_resolver(Arc::new(OverrideResolver::new(server)));
        }
        builder
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }

    fn apply_headers(
        mut req: reqwest::RequestBuilder,
        headers: Option<HeaderMap>,
    ) -> reqwest::RequestBuilder {
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        req
    }

    /// Fold an explicit range into the caller's header set. The explicit
    /// range always replaces a `Range` the caller may have carried along.
    fn fold_range(
        headers: Option<HeaderMap>,
        range: Option<&RangeSpec>,
    ) -> NetResult<Option<HeaderMap>> {
        let Some(range) = range else {
            return Ok(headers);
        };

        let mut merged = headers.unwrap_or_default();
        let value = http::HeaderValue::try_from(range.to_header_value())
            .map_err(|e| NetError::Http(format!("invalid range header: {e}")))?;
        merged.insert(http::header::RANGE, value);
        Ok(Some(merged))
    }

    async fn send_checked(
        &self,
        url: &Url,
        req: reqwest::RequestBuilder,
    ) -> NetResult<reqwest::Response> {
        let resp = req
            .timeout(self.options.request_timeout)
            .send()
            .await
            .map_err(NetError::from)?;
        let status = resp.status();

        if !(status.is_success() || status.is_redirection()) {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetError::HttpStatus {
                status: status.as_u16(),
                url: url.clone(),
                body: Some(body),
            });
        }

        Ok(resp)
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_ranged(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<HeaderMap>,
    ) -> NetResult<NetResponse> {
        let headers = Self::fold_range(headers, Some(&range))?;
        let req = Self::apply_headers(self.inner.get(url.clone()), headers);

        let resp = self.send_checked(&url, req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(NetError::from)?;

        Ok(NetResponse {
            status,
            headers,
            body,
        })
    }

    async fn get_streaming(
        &self,
        url: Url,
        range: Option<RangeSpec>,
        headers: Option<HeaderMap>,
    ) -> NetResult<StreamingResponse> {
        let headers = Self::fold_range(headers, range.as_ref())?;
        let req = Self::apply_headers(self.inner.get(url.clone()), headers);

        let resp = self.send_checked(&url, req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes_stream().map_err(NetError::from);

        Ok(StreamingResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
    ) -> NetResult<NetResponse> {
        let mut req = self.inner.request(method, url.clone());
        req = Self::apply_headers(req, headers);
        if let Some(body) = body {
            req = req.body(body);
        }

        let resp = self.send_checked(&url, req).await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(NetError::from)?;

        Ok(NetResponse {
            status,
            headers,
            body,
        })
    }
}
