//! Ephemeral HTTP servers for exercising the proxy and its upstreams.

use std::net::SocketAddr;

use axum::Router;
use tokio::{net::TcpListener, task::JoinHandle};
use url::Url;

/// An axum router bound to an ephemeral localhost port for one test.
///
/// The serving task is aborted when the fixture is dropped, so a test can
/// also make an upstream vanish mid-session by dropping its server.
pub struct TestHttpServer {
    addr: SocketAddr,
    serve_task: JoinHandle<()>,
}

impl TestHttpServer {
    /// Bind `router` on `127.0.0.1:0` and start serving it.
    ///
    /// # Panics
    ///
    /// Panics if no ephemeral port can be bound.
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind an ephemeral test port");
        let addr = listener.local_addr().expect("ephemeral port has an addr");

        let serve_task = tokio::spawn(async move {
            // Runs until the fixture aborts it; failing earlier is a test bug.
            axum::serve(listener, router)
                .await
                .expect("serve test router");
        });

        Self { addr, serve_task }
    }

    /// Absolute URL for `path` on this server.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not form a valid URL against the bound address.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!("http://{}/{}", self.addr, path)
            .parse()
            .expect("URL from bound addr and path")
    }

    /// Root URL of this server.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.url("/")
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.serve_task.abort();
    }
}
