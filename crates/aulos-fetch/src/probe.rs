//! Upstream discovery: a small Range request that reveals size, type and
//! range support, and yields the normalized header set served to clients.

use std::sync::LazyLock;

use aulos_net::{ByteStream, HttpClient, Net, NetError, NetResult, RangeSpec, RetryPolicy};
use http::{HeaderMap, HeaderValue, header};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, FetchResult};

/// Window requested by the probe; large enough to make range-capable
/// upstreams reveal `Content-Range`, small enough to stay cheap.
pub const PROBE_WINDOW: u64 = 1024;

static CONTENT_RANGE_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([0-9]+)\s*$").expect("valid content-range pattern"));
static DISPOSITION_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename="([^"]+)""#).expect("valid filename pattern"));

/// Everything a session needs to know about an upstream resource.
#[derive(Clone, Debug)]
pub struct ProbeOutcome {
    /// Upstream response headers after normalization.
    pub headers: HeaderMap,
    /// Full resource size in bytes (0 when the upstream revealed none).
    pub total_size: u64,
    /// Whether the upstream honors byte ranges.
    pub supports_range: bool,
    /// Filename derived from `Content-Disposition` or the URL path.
    pub filename: String,
}

/// Probe `url` with a `Range: bytes=0-1023` request.
///
/// Retries transport failures per the client's retry policy; a non-2xx/3xx
/// status is terminal and carries the upstream body text. The returned
/// stream is the unread probe body, used by the direct-relay path when the
/// upstream turns out not to support ranges.
pub async fn probe(
    net: &HttpClient,
    url: &Url,
    headers: &HeaderMap,
) -> FetchResult<(ProbeOutcome, ByteStream)> {
    let policy = RetryPolicy::new(
        net.options().max_retries,
        net.options().retry_base_delay,
        net.options().max_retry_delay,
    );
    let window = RangeSpec::new(0, Some(PROBE_WINDOW - 1));

    let resp = retry_streaming(net, url, &window, headers, &policy).await?;

    let declared = resp
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let outcome = normalize(url, resp.headers, declared);

    debug!(
        url = %url,
        total_size = outcome.total_size,
        supports_range = outcome.supports_range,
        filename = %outcome.filename,
        "upstream probe complete"
    );

    Ok((outcome, resp.body))
}

async fn retry_streaming(
    net: &HttpClient,
    url: &Url,
    window: &RangeSpec,
    headers: &HeaderMap,
    policy: &RetryPolicy,
) -> FetchResult<aulos_net::StreamingResponse> {
    let mut last_err: Option<NetError> = None;

    for attempt in 0..=policy.max_retries {
        let sent: NetResult<aulos_net::StreamingResponse> = net
            .get_streaming(url.clone(), Some(window.clone()), Some(headers.clone()))
            .await;
        match sent {
            Ok(resp) => return Ok(resp),
            Err(err) => {
                debug!(url = %url, attempt, error = %err, "probe attempt failed");
                if !err.is_retryable() || attempt == policy.max_retries {
                    return Err(into_fetch_error(err));
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt + 1)).await;
                last_err = Some(err);
            }
        }
    }

    Err(last_err.map(into_fetch_error).unwrap_or(FetchError::Aborted))
}

fn into_fetch_error(err: NetError) -> FetchError {
    match err {
        NetError::HttpStatus { status, body, .. } => FetchError::UpstreamStatus { status, body },
        other => FetchError::Net(other),
    }
}

/// Apply the header post-processing rules to a raw probe response.
fn normalize(url: &Url, mut headers: HeaderMap, declared_length: Option<u64>) -> ProbeOutcome {
    let filename = derive_filename(url, &headers);

    if !headers.contains_key(header::CONTENT_TYPE)
        && let Some(mime) = mime_for_filename(&filename)
        && let Ok(value) = HeaderValue::from_str(mime)
    {
        headers.insert(header::CONTENT_TYPE, value);
    }

    let content_range_total = headers
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| CONTENT_RANGE_TOTAL.captures(v))
        .and_then(|c| c[1].parse::<u64>().ok());

    let total_size = content_range_total.or(declared_length).unwrap_or(0);
    if let Ok(value) = HeaderValue::from_str(&total_size.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    let supports_range =
        headers.contains_key(header::CONTENT_RANGE) || headers.contains_key(header::ACCEPT_RANGES);

    ProbeOutcome {
        headers,
        total_size,
        supports_range,
        filename,
    }
}

fn derive_filename(url: &Url, headers: &HeaderMap) -> String {
    if let Some(disposition) = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        && let Some(captures) = DISPOSITION_FILENAME.captures(disposition)
    {
        return captures[1].to_string();
    }

    // Last path segment, cut at the first `?` for opaque URLs.
    let path = url.path();
    let tail = path.rsplit('/').next().unwrap_or(path);
    tail.split('?').next().unwrap_or(tail).to_string()
}

fn mime_for_filename(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "ts" => "video/mp2t",
        "mpeg" | "mpg" => "video/mpeg",
        "3gpp" | "3gp" => "video/3gpp",
        "mp4" | "m4s" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}
