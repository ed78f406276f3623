use std::{net::SocketAddr, sync::Arc};

use hickory_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Routes every hostname lookup through a single configured DNS server.
#[derive(Clone)]
pub(crate) struct OverrideResolver {
    resolver: Arc<TokioAsyncResolver>,
}

impl OverrideResolver {
    pub(crate) fn new(server: SocketAddr) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], group);
        let resolver = TokioAsyncResolver::tokio(config, ResolverOpts::default());
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl Resolve for OverrideResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let lookup = resolver.lookup_ip(name.as_str()).await?;
            let addrs: Addrs = Box::new(lookup.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}
