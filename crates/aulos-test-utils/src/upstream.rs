//! Synthetic byte-addressable upstream for proxy and downloader tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    response::Response,
    routing::get,
};
use bytes::Bytes;
use http::HeaderMap;

/// Behavior knobs for the synthetic upstream.
#[derive(Clone, Debug, Default)]
pub struct UpstreamOptions {
    /// When false the upstream ignores `Range` and always answers 200 with
    /// the full body and no `Accept-Ranges`/`Content-Range`.
    pub support_range: bool,
    /// Optional `Content-Type` on every response.
    pub content_type: Option<String>,
    /// Optional `Content-Disposition` on every response.
    pub content_disposition: Option<String>,
    /// Answer 500 to the first N requests (for retry tests).
    pub fail_first: usize,
}

impl UpstreamOptions {
    #[must_use]
    pub fn ranged() -> Self {
        Self {
            support_range: true,
            ..Self::default()
        }
    }
}

/// Observations collected by the upstream across all requests.
#[derive(Debug, Default)]
pub struct UpstreamRecorder {
    hits: AtomicUsize,
    headers: Mutex<Vec<HeaderMap>>,
}

impl UpstreamRecorder {
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Acquire)
    }

    /// Header sets of every request received so far, in arrival order.
    #[must_use]
    pub fn seen_headers(&self) -> Vec<HeaderMap> {
        self.headers.lock().unwrap().clone()
    }
}

struct UpstreamState {
    body: Bytes,
    options: UpstreamOptions,
    recorder: Arc<UpstreamRecorder>,
}

/// Router serving `body` at `/media.mp4` per `options`.
///
/// Returns the router plus a recorder for asserting on what the upstream
/// observed.
#[must_use]
pub fn media_router(body: Bytes, options: UpstreamOptions) -> (Router, Arc<UpstreamRecorder>) {
    let recorder = Arc::new(UpstreamRecorder::default());
    let state = Arc::new(UpstreamState {
        body,
        options,
        recorder: Arc::clone(&recorder),
    });

    let router = Router::new()
        .route("/media.mp4", get(serve_media))
        .with_state(state);
    (router, recorder)
}

fn parse_range(headers: &HeaderMap, total: usize) -> Option<(usize, usize)> {
    let raw = headers.get(http::header::RANGE)?.to_str().ok()?;
    let spec = raw.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    let start: usize = start_str.trim().parse().ok()?;
    let end: usize = if end_str.trim().is_empty() {
        total.saturating_sub(1)
    } else {
        end_str.trim().parse().ok()?
    };
    Some((start, end.min(total.saturating_sub(1))))
}

async fn serve_media(
    State(state): State<Arc<UpstreamState>>,
    request: Request,
) -> Result<Response, StatusCode> {
    let hit = state.recorder.hits.fetch_add(1, Ordering::AcqRel);
    state
        .recorder
        .headers
        .lock()
        .unwrap()
        .push(request.headers().clone());

    if hit < state.options.fail_first {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let total = state.body.len();
    let mut builder = Response::builder();
    if let Some(ct) = &state.options.content_type {
        builder = builder.header(http::header::CONTENT_TYPE, ct);
    }
    if let Some(cd) = &state.options.content_disposition {
        builder = builder.header(http::header::CONTENT_DISPOSITION, cd);
    }

    if !state.options.support_range {
        return Ok(builder
            .status(StatusCode::OK)
            .header(http::header::CONTENT_LENGTH, total)
            .body(axum::body::Body::from(state.body.clone()))
            .unwrap());
    }

    match parse_range(request.headers(), total) {
        Some((start, _)) if start >= total => Ok(builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(http::header::CONTENT_RANGE, format!("bytes */{total}"))
            .body(axum::body::Body::empty())
            .unwrap()),
        Some((start, end)) => Ok(builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(http::header::ACCEPT_RANGES, "bytes")
            .header(
                http::header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{total}"),
            )
            .header(http::header::CONTENT_LENGTH, end - start + 1)
            .body(axum::body::Body::from(state.body.slice(start..=end)))
            .unwrap()),
        None => Ok(builder
            .status(StatusCode::OK)
            .header(http::header::ACCEPT_RANGES, "bytes")
            .header(http::header::CONTENT_LENGTH, total)
            .body(axum::body::Body::from(state.body.clone()))
            .unwrap()),
    }
}
