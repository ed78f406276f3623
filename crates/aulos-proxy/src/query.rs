//! Query-string and Range-header interpretation for proxy requests.

use std::{collections::HashMap, sync::LazyLock};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use http::HeaderMap;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::error::ProxyError;

static RANGE_SPEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bytes= *([0-9]+) *- *([0-9]*)").expect("valid range pattern"));

/// Recognized query parameters, shared by the media path and the relay.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub form: Option<String>,
    pub headers: Option<String>,
    pub auth: Option<String>,
    pub thread: Option<u64>,
    pub size: Option<u64>,
}

impl ProxyQuery {
    fn is_base64(&self) -> bool {
        self.form.as_deref() == Some("base64")
    }
}

/// Upstream target and extra request headers after decoding.
#[derive(Debug)]
pub struct ResolvedTarget {
    pub url: Url,
    pub extra_headers: HashMap<String, String>,
}

/// `auth` must match the configured key whenever it is present.
pub fn check_auth(query: &ProxyQuery, auth_key: &str) -> Result<(), ProxyError> {
    match query.auth.as_deref() {
        Some(auth) if !auth.is_empty() && auth != auth_key => Err(ProxyError::Unauthorized),
        _ => Ok(()),
    }
}

/// Decode `url` and `headers`, honoring `form=base64`.
pub fn resolve_target(query: &ProxyQuery) -> Result<ResolvedTarget, ProxyError> {
    let raw_url = query
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ProxyError::BadRequest("missing url parameter".to_string()))?;

    let url_text = if query.is_base64() {
        let decoded = BASE64
            .decode(raw_url)
            .map_err(|e| ProxyError::BadRequest(format!("invalid base64 url: {e}")))?;
        String::from_utf8(decoded)
            .map_err(|e| ProxyError::BadRequest(format!("invalid base64 url: {e}")))?
    } else {
        raw_url.to_string()
    };

    let url = Url::parse(&url_text)
        .map_err(|e| ProxyError::BadRequest(format!("invalid url: {e}")))?;

    let extra_headers = match query.headers.as_deref().filter(|h| !h.is_empty()) {
        None => HashMap::new(),
        Some(raw) => {
            let json_text = if query.is_base64() {
                let decoded = BASE64
                    .decode(raw)
                    .map_err(|e| ProxyError::BadRequest(format!("invalid base64 headers: {e}")))?;
                String::from_utf8(decoded).map_err(|e| {
                    ProxyError::BadRequest(format!("invalid base64 headers: {e}"))
                })?
            } else {
                raw.to_string()
            };
            serde_json::from_str(&json_text)
                .map_err(|e| ProxyError::BadRequest(format!("invalid headers json: {e}")))?
        }
    };

    Ok(ResolvedTarget { url, extra_headers })
}

/// Merge decoded extra headers over the client's header set.
pub fn merge_headers(
    client_headers: &HeaderMap,
    extra: &HashMap<String, String>,
) -> Result<HeaderMap, ProxyError> {
    let mut merged = client_headers.clone();
    for (name, value) in extra {
        let name: http::HeaderName = name
            .parse()
            .map_err(|_| ProxyError::BadRequest(format!("invalid header name: {name}")))?;
        let value: http::HeaderValue = value
            .parse()
            .map_err(|_| ProxyError::BadRequest(format!("invalid header value for {name}")))?;
        merged.insert(name, value);
    }
    Ok(merged)
}

/// Parse the client `Range` header into `(start, end)`.
///
/// An empty end (`bytes=N-`) comes back as `None` and later resolves to the
/// last byte of the resource.
#[must_use]
pub fn parse_range(headers: &HeaderMap) -> Option<(u64, Option<u64>)> {
    let raw = headers.get(http::header::RANGE)?.to_str().ok()?;
    let captures = RANGE_SPEC.captures(raw)?;

    let start = captures[1].parse().ok()?;
    let end = match &captures[2] {
        "" => None,
        text => Some(text.parse().ok()?),
    };
    Some((start, end))
}
