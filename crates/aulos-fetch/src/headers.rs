//! Request-header hygiene for forwarded requests.

use http::HeaderMap;

/// Header names never forwarded upstream. `Range` is deliberately absent:
/// the probe forwards it and the downloader replaces it per chunk.
const FILTERED_NAMES: &[&str] = &["host", "http-client-ip", "remote-addr", "accept-encoding"];

/// New header set without hop-by-hop or identity-revealing entries.
///
/// Multi-valued headers keep all their values. Filtering an already
/// filtered set is a no-op.
#[must_use]
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if FILTERED_NAMES
            .iter()
            .any(|filtered| name.as_str().eq_ignore_ascii_case(filtered))
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
