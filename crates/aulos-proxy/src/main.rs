use std::{
    error::Error,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use aulos_proxy::{AppState, router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Debug, Parser)]
#[command(name = "aulos-proxy", version, about = "HTTP media proxy with a parallel segmented downloader", long_about = None)]
struct Args {
    /// DNS server for upstream lookups, as IP or IP:port
    #[arg(long, default_value = "8.8.8.8")]
    dns: String,

    /// Listen port
    #[arg(long, default_value_t = 57574)]
    port: u16,

    /// Verbose logging
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = clap::ArgAction::Set)]
    debug: bool,

    /// Shared auth key checked against the `auth` query parameter
    #[arg(long, default_value = "drpys")]
    auth: String,
}

fn parse_dns(raw: &str) -> Option<SocketAddr> {
    raw.parse::<SocketAddr>().ok().or_else(|| {
        raw.parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    if args.debug {
        info!("debug logging enabled");
    }

    let dns_server = parse_dns(&args.dns);
    if dns_server.is_none() {
        warn!(dns = %args.dns, "unparseable DNS server, using the system resolver");
    }

    let state = Arc::new(AppState::new(args.auth, dns_server));
    let app = router(state);

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, "aulos proxy listening");
    axum::serve(listener, app).await?;

    Ok(())
}
