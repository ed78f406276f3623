mod get;
mod relay;

use std::sync::Arc;

use http::{HeaderMap, header};
use reqwest::cookie::Jar;
use url::Url;

pub use get::handle_get;
pub use relay::handle_relay;

/// Cookie jar seeded from the client's `Cookie` header, scoped to one
/// session against `url`. Never shared across client requests.
pub(crate) fn session_jar(headers: &HeaderMap, url: &Url) -> Arc<Jar> {
    let jar = Jar::default();
    for value in headers.get_all(header::COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        for piece in text.split(';') {
            let piece = piece.trim();
            if !piece.is_empty() {
                jar.add_cookie_str(piece, url);
            }
        }
    }
    Arc::new(jar)
}

/// Copy upstream headers for the client, dropping connection management.
pub(crate) fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if *name == header::CONNECTION
            || *name == header::TRANSFER_ENCODING
            || name.as_str().eq_ignore_ascii_case("proxy-connection")
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
