//! Application state and routing.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use aulos_fetch::HeaderCache;
use aulos_net::NetOptions;
use axum::{Router, routing::get};

use crate::handlers::{handle_get, handle_relay};

/// Per-request timeout for segment fetches and the method relay.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
/// The probe is allowed to be slower; some origins stall before first byte.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AppState {
    pub auth_key: String,
    pub cache: HeaderCache,
    pub dns_server: Option<SocketAddr>,
}

impl AppState {
    #[must_use]
    pub fn new(auth_key: String, dns_server: Option<SocketAddr>) -> Self {
        Self {
            auth_key,
            cache: HeaderCache::new(),
            dns_server,
        }
    }

    fn net_options(&self, timeout: Duration) -> NetOptions {
        NetOptions {
            request_timeout: timeout,
            dns_server: self.dns_server,
            ..NetOptions::default()
        }
    }

    #[must_use]
    pub fn probe_options(&self) -> NetOptions {
        self.net_options(PROBE_TIMEOUT)
    }

    #[must_use]
    pub fn segment_options(&self) -> NetOptions {
        self.net_options(UPSTREAM_TIMEOUT)
    }

    #[must_use]
    pub fn relay_options(&self) -> NetOptions {
        self.net_options(UPSTREAM_TIMEOUT)
    }
}

/// The complete proxy surface: everything hangs off `/`.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            get(handle_get)
                .head(handle_relay)
                .post(handle_relay)
                .put(handle_relay)
                .delete(handle_relay)
                .patch(handle_relay)
                .options(handle_relay),
        )
        .with_state(state)
}
