//! Pass-through relay for non-GET methods.

use std::sync::Arc;

use aulos_fetch::filter_request_headers;
use aulos_net::{HttpClient, Net, NetError, NetResponse, RetryPolicy};
use axum::{
    body::Body,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use tracing::debug;

use crate::{
    app::AppState,
    error::ProxyError,
    handlers::{relay_headers, session_jar},
    query::{ProxyQuery, check_auth, merge_headers, resolve_target},
};

pub async fn handle_relay(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(query): Query<ProxyQuery>,
    client_headers: HeaderMap,
    body: Bytes,
) -> Response {
    match relay(&state, method, query, client_headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn relay(
    state: &AppState,
    method: Method,
    query: ProxyQuery,
    client_headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    check_auth(&query, &state.auth_key)?;
    let target = resolve_target(&query)?;

    let merged = merge_headers(&client_headers, &target.extra_headers)?;
    let filtered = filter_request_headers(&merged);
    let jar = session_jar(&merged, &target.url);

    debug!(method = %method, url = %target.url, "relaying request");

    let options = state.relay_options();
    let policy = RetryPolicy::new(
        options.max_retries,
        options.retry_base_delay,
        options.max_retry_delay,
    );
    let net = HttpClient::with_cookie_jar(options, jar)?;
    let body = (!body.is_empty()).then_some(body);

    let upstream = send_with_retries(&net, &method, &target, &filtered, body.as_ref(), &policy)
        .await?;

    let mut headers = relay_headers(&upstream.headers);
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    Ok(response)
}

async fn send_with_retries(
    net: &HttpClient,
    method: &Method,
    target: &crate::query::ResolvedTarget,
    headers: &HeaderMap,
    body: Option<&Bytes>,
    policy: &RetryPolicy,
) -> Result<NetResponse, ProxyError> {
    let mut last_err: Option<NetError> = None;

    for attempt in 0..=policy.max_retries {
        let sent = net
            .request(
                method.clone(),
                target.url.clone(),
                Some(headers.clone()),
                body.cloned(),
            )
            .await;
        match sent {
            Ok(resp) => return Ok(resp),
            Err(err) => {
                debug!(attempt, error = %err, url = %target.url, "relay attempt failed");
                if !err.is_retryable() || attempt == policy.max_retries {
                    return Err(relay_error(err));
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt + 1)).await;
                last_err = Some(err);
            }
        }
    }

    Err(last_err.map(relay_error).unwrap_or(ProxyError::Upstream(
        aulos_fetch::FetchError::Aborted,
    )))
}

fn relay_error(err: NetError) -> ProxyError {
    match err {
        NetError::HttpStatus { status, body, .. } => {
            ProxyError::Upstream(aulos_fetch::FetchError::UpstreamStatus { status, body })
        }
        other => other.into(),
    }
}
