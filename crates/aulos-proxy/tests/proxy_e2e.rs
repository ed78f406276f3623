//! End-to-end tests: a real proxy instance in front of a synthetic
//! upstream, exercised through a plain HTTP client.

use std::sync::Arc;

use aulos_proxy::{AppState, router};
use aulos_test_utils::{TestHttpServer, UpstreamOptions, deterministic_body, media_router};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;

const AUTH_KEY: &str = "drpys";

async fn start_proxy() -> TestHttpServer {
    let state = Arc::new(AppState::new(AUTH_KEY.to_string(), None));
    TestHttpServer::new(router(state)).await
}

async fn start_upstream(body: Bytes, options: UpstreamOptions) -> (TestHttpServer, Arc<aulos_test_utils::UpstreamRecorder>) {
    let (router, recorder) = media_router(body, options);
    (TestHttpServer::new(router).await, recorder)
}

fn proxy_url(proxy: &TestHttpServer, upstream_media_url: &url::Url, extra: &str) -> String {
    format!(
        "{}?url={}{}",
        proxy.base_url(),
        urlencode(upstream_media_url.as_str()),
        extra
    )
}

fn urlencode(raw: &str) -> String {
    raw.replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('&', "%26")
        .replace('+', "%2B")
        .replace('=', "%3D")
}

#[tokio::test]
async fn full_range_request_is_served_in_segments() {
    let body = deterministic_body(1024 * 1024, 0xE2E);
    let (upstream, _recorder) = start_upstream(body.clone(), UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "&thread=4&size=65536");
    let resp = reqwest::Client::new()
        .get(url)
        .header("Range", "bytes=0-")
        .send()
        .await
        .expect("proxy responds");

    assert_eq!(resp.status(), 206);
    assert_eq!(
        resp.headers().get("Content-Range").unwrap(),
        "bytes 0-1048575/1048576"
    );
    assert_eq!(resp.headers().get("Content-Length").unwrap(), "1048576");
    assert_eq!(resp.headers().get("Accept-Ranges").unwrap(), "bytes");

    let received = resp.bytes().await.expect("body");
    assert_eq!(received, body);
}

#[tokio::test]
async fn no_range_request_streams_the_whole_file_as_200() {
    let body = deterministic_body(256 * 1024, 0x200);
    let (upstream, _recorder) = start_upstream(body.clone(), UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "&thread=2&size=32768");
    let resp = reqwest::Client::new().get(url).send().await.expect("proxy responds");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("Content-Length").unwrap(), "262144");
    let received = resp.bytes().await.expect("body");
    assert_eq!(received, body);
}

#[tokio::test]
async fn single_byte_range() {
    let body = deterministic_body(64 * 1024, 0x1B);
    let (upstream, _recorder) = start_upstream(body.clone(), UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "");
    let resp = reqwest::Client::new()
        .get(url)
        .header("Range", "bytes=0-0")
        .send()
        .await
        .expect("proxy responds");

    assert_eq!(resp.status(), 206);
    assert_eq!(
        resp.headers().get("Content-Range").unwrap(),
        "bytes 0-0/65536"
    );
    assert_eq!(resp.headers().get("Content-Length").unwrap(), "1");
    let received = resp.bytes().await.expect("body");
    assert_eq!(received.as_ref(), &body[..1]);
}

#[tokio::test]
async fn range_past_the_end_is_416() {
    let body = deterministic_body(4096, 0x416);
    let (upstream, _recorder) = start_upstream(body, UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "");
    let resp = reqwest::Client::new()
        .get(url)
        .header("Range", "bytes=4096-")
        .send()
        .await
        .expect("proxy responds");

    assert_eq!(resp.status(), 416);
    assert_eq!(
        resp.headers().get("Content-Range").unwrap(),
        "bytes */4096"
    );
    assert!(resp.bytes().await.expect("body").is_empty());
}

#[tokio::test]
async fn wrong_auth_key_is_rejected() {
    let body = deterministic_body(1024, 0xA01);
    let (upstream, recorder) = start_upstream(body, UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "&auth=wrong");
    let resp = reqwest::Client::new().get(url).send().await.expect("proxy responds");

    assert_eq!(resp.status(), 401);
    // Rejected before anything touches the upstream.
    assert_eq!(recorder.hits(), 0);
}

#[tokio::test]
async fn matching_auth_key_is_accepted() {
    let body = deterministic_body(2048, 0xA02);
    let (upstream, _recorder) = start_upstream(body.clone(), UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), &format!("&auth={AUTH_KEY}"));
    let resp = reqwest::Client::new().get(url).send().await.expect("proxy responds");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.expect("body"), body);
}

#[tokio::test]
async fn base64_form_decodes_url_and_merges_headers() {
    let body = deterministic_body(8192, 0xB64);
    let (upstream, recorder) = start_upstream(body.clone(), UpstreamOptions::ranged()).await;
    let proxy = start_proxy().await;

    let url_b64 = BASE64.encode(upstream.url("/media.mp4").as_str());
    let headers_b64 = BASE64.encode(r#"{"X-Test":"1"}"#);
    let url = format!(
        "{}?url={}&form=base64&headers={}",
        proxy.base_url(),
        urlencode(&url_b64),
        urlencode(&headers_b64)
    );

    let resp = reqwest::Client::new()
        .get(url)
        .header("Accept-Encoding", "gzip")
        .send()
        .await
        .expect("proxy responds");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.expect("body"), body);

    let seen = recorder.seen_headers();
    assert!(!seen.is_empty());
    for headers in &seen {
        // Exactly one merged X-Test value, and client hop headers stripped.
        let x_test: Vec<_> = headers.get_all("x-test").iter().collect();
        assert_eq!(x_test, ["1"]);
        assert!(headers.get("accept-encoding").is_none());
        // Host points at the upstream, not at the proxy.
        let host = headers.get("host").unwrap().to_str().unwrap();
        assert!(upstream.base_url().as_str().contains(host));
    }
}

#[tokio::test]
async fn non_range_upstream_is_relayed_directly() {
    let body = deterministic_body(150 * 1024, 0xD1F);
    let (upstream, _recorder) = start_upstream(
        body.clone(),
        UpstreamOptions {
            support_range: false,
            ..UpstreamOptions::default()
        },
    )
    .await;
    let proxy = start_proxy().await;

    let url = proxy_url(&proxy, &upstream.url("/media.mp4"), "");
    let resp = reqwest::Client::new().get(url).send().await.expect("proxy responds");

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("Content-Disposition").unwrap(),
        "attachment; filename*=UTF-8''media.mp4"
    );
    assert_eq!(resp.bytes().await.expect("body"), body);
}

#[tokio::test]
async fn bare_get_serves_the_index_page() {
    let proxy = start_proxy().await;

    let resp = reqwest::Client::new()
        .get(proxy.base_url())
        .send()
        .await
        .expect("proxy responds");

    assert_eq!(resp.status(), 200);
    let text = resp.text().await.expect("body");
    assert!(text.contains("aulos media proxy"));
}

#[tokio::test]
async fn missing_url_parameter_is_bad_request() {
    let proxy = start_proxy().await;

    let resp = reqwest::Client::new()
        .get(format!("{}?thread=4", proxy.base_url()))
        .send()
        .await
        .expect("proxy responds");

    assert_eq!(resp.status(), 400);
}

mod relay {
    use super::*;
    use axum::{
        Router,
        extract::Request,
        http::StatusCode,
        response::Response,
        routing::{delete, post},
    };

    fn relay_upstream() -> Router {
        async fn echo(request: Request) -> Result<Response, StatusCode> {
            let marker = request
                .headers()
                .get("X-Relay-Marker")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .map_err(|_| StatusCode::BAD_REQUEST)?;
            Ok(Response::builder()
                .status(StatusCode::CREATED)
                .header("X-Relay-Echo", marker)
                .body(axum::body::Body::from(body))
                .unwrap())
        }

        async fn gone() -> StatusCode {
            StatusCode::GONE
        }

        Router::new()
            .route("/submit", post(echo))
            .route("/gone", delete(gone))
    }

    #[tokio::test]
    async fn post_is_forwarded_with_body_and_headers() {
        let upstream = TestHttpServer::new(relay_upstream()).await;
        let proxy = start_proxy().await;

        let url = proxy_url(&proxy, &upstream.url("/submit"), "");
        let resp = reqwest::Client::new()
            .post(url)
            .header("X-Relay-Marker", "m1")
            .body("relay payload")
            .send()
            .await
            .expect("proxy responds");

        assert_eq!(resp.status(), 201);
        assert_eq!(resp.headers().get("X-Relay-Echo").unwrap(), "m1");
        assert_eq!(resp.bytes().await.expect("body").as_ref(), b"relay payload");
    }

    #[tokio::test]
    async fn upstream_error_status_is_relayed() {
        let upstream = TestHttpServer::new(relay_upstream()).await;
        let proxy = start_proxy().await;

        let url = proxy_url(&proxy, &upstream.url("/gone"), "");
        let resp = reqwest::Client::new()
            .delete(url)
            .send()
            .await
            .expect("proxy responds");

        assert_eq!(resp.status(), 410);
    }

    #[tokio::test]
    async fn relay_also_checks_auth(){
        let upstream = TestHttpServer::new(relay_upstream()).await;
        let proxy = start_proxy().await;

        let url = proxy_url(&proxy, &upstream.url("/submit"), "&auth=nope");
        let resp = reqwest::Client::new()
            .post(url)
            .send()
            .await
            .expect("proxy responds");

        assert_eq!(resp.status(), 401);
    }
}
