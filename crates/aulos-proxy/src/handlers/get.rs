//! The media path: probe or cache, then pump a segmented download (or the
//! probe body itself) into the client response.

use std::{convert::Infallible, sync::Arc};

use aulos_fetch::{
    DownloadSession, FetchError, ParamHints, ProbeOutcome, SessionConfig, SessionParams,
    filter_request_headers, probe,
};
use aulos_net::{ByteStream, HttpClient, NetError};
use aulos_pipe::pipe;
use axum::{
    body::Body,
    extract::{Query, RawQuery, State},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use tracing::debug;

use crate::{
    app::AppState,
    error::ProxyError,
    handlers::{relay_headers, session_jar},
    query::{ProxyQuery, check_auth, merge_headers, parse_range, resolve_target},
};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Blocks handed to the client on the direct-relay path.
const RELAY_BLOCK: usize = 64 * 1024;
/// In-flight chunks between the downloader and the client connection.
const PIPE_SLOTS: usize = 2;

pub async fn handle_get(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<ProxyQuery>,
    client_headers: HeaderMap,
) -> Response {
    if raw_query.as_deref().unwrap_or_default().is_empty() {
        return Html(INDEX_HTML).into_response();
    }

    match serve_media(&state, query, client_headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_media(
    state: &AppState,
    query: ProxyQuery,
    client_headers: HeaderMap,
) -> Result<Response, ProxyError> {
    check_auth(&query, &state.auth_key)?;
    let target = resolve_target(&query)?;

    let merged = merge_headers(&client_headers, &target.extra_headers)?;
    let filtered = filter_request_headers(&merged);
    let client_range = parse_range(&merged);
    let jar = session_jar(&merged, &target.url);

    debug!(url = %target.url, range = ?client_range, "media request");

    let (outcome, probe_body) = match state.cache.lookup(target.url.as_str()) {
        Some(outcome) => (outcome, None),
        None => {
            let probe_net = HttpClient::with_cookie_jar(state.probe_options(), Arc::clone(&jar))?;
            let (outcome, body) = probe(&probe_net, &target.url, &filtered).await?;
            state.cache.store(target.url.as_str(), &outcome);
            (outcome, Some(body))
        }
    };

    if !outcome.supports_range {
        // Non-range upstreams are never cached, so the probe body is live.
        let Some(body) = probe_body else {
            return Err(ProxyError::Upstream(FetchError::Aborted));
        };
        return Ok(relay_direct(&outcome, body));
    }

    let total = outcome.total_size;
    let last_byte = total.saturating_sub(1);
    let (range_start, range_end) = match client_range {
        Some((start, end)) => (start, end.unwrap_or(last_byte).min(last_byte)),
        None => (0, last_byte),
    };
    if range_start >= total {
        return Err(ProxyError::RangeNotSatisfiable { total });
    }

    let params = SessionParams::resolve(
        ParamHints {
            workers: query.thread,
            chunk_size: query.size,
        },
        total,
        range_start,
        range_end,
    );
    let (session, queue) = DownloadSession::new(SessionConfig {
        url: target.url.clone(),
        headers: filtered,
        range_start,
        range_end,
        params,
    });

    let segment_net = HttpClient::with_cookie_jar(state.segment_options(), jar)?;
    let (writer, reader) = pipe(PIPE_SLOTS);
    tokio::spawn(aulos_fetch::run(session, queue, segment_net, writer));

    let mut headers = relay_headers(&outcome.headers);
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CONTENT_RANGE,
        HeaderValue::try_from(format!("bytes {range_start}-{range_end}/{total}"))
            .map_err(|e| ProxyError::BadRequest(e.to_string()))?,
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(range_end - range_start + 1),
    );

    let status = if client_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let stream = reader.into_stream().map(Ok::<Bytes, Infallible>);

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Stream the probe body straight through for upstreams without range
/// support, re-blocked so a single client read never exceeds 64 KiB.
fn relay_direct(outcome: &ProbeOutcome, body: ByteStream) -> Response {
    let mut headers = relay_headers(&outcome.headers);
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    if let Ok(value) = HeaderValue::try_from(format!(
        "attachment; filename*=UTF-8''{}",
        outcome.filename
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let stream = body.flat_map(|block| {
        let pieces: Vec<Result<Bytes, NetError>> = match block {
            Ok(bytes) => split_blocks(bytes).into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        };
        futures::stream::iter(pieces)
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.headers_mut() = headers;
    response
}

fn split_blocks(bytes: Bytes) -> Vec<Bytes> {
    let mut out = Vec::with_capacity(bytes.len().div_ceil(RELAY_BLOCK).max(1));
    let mut rest = bytes;
    while rest.len() > RELAY_BLOCK {
        out.push(rest.split_to(RELAY_BLOCK));
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}
