//! Process-wide cache of probed upstream headers.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::probe::ProbeOutcome;

const ENTRY_TTL: Duration = Duration::from_secs(1800);
const FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct CachedProbe {
    outcome: ProbeOutcome,
    last_refresh: Instant,
}

/// URL → probed headers, with a hard TTL and a shorter freshness window.
///
/// A lookup hits only while the entry is younger than the freshness window;
/// between the freshness window and the TTL the entry survives but callers
/// re-probe (and overwrite it). Only range-capable upstreams are stored;
/// direct-relay upstreams re-probe on every request.
pub struct HeaderCache {
    entries: DashMap<String, CachedProbe>,
    ttl: Duration,
    freshness: Duration,
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ENTRY_TTL, FRESHNESS_WINDOW)
    }

    #[must_use]
    pub fn with_limits(ttl: Duration, freshness: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            freshness,
        }
    }

    /// Fresh probe outcome for `url`, if one is cached.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<ProbeOutcome> {
        let expired = {
            let entry = self.entries.get(url)?;
            let age = entry.last_refresh.elapsed();

            if age <= self.freshness {
                debug!(url, age_secs = age.as_secs(), "header cache hit");
                return Some(entry.outcome.clone());
            }
            age > self.ttl
        };

        if expired {
            self.entries.remove(url);
        }
        debug!(url, "header cache stale, re-probe required");
        None
    }

    /// Store `outcome` for `url`; non-range upstreams are never cached.
    pub fn store(&self, url: &str, outcome: &ProbeOutcome) {
        if !outcome.supports_range {
            return;
        }
        self.entries.insert(
            url.to_string(),
            CachedProbe {
                outcome: outcome.clone(),
                last_refresh: Instant::now(),
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;

    use super::*;

    fn outcome(supports_range: bool) -> ProbeOutcome {
        ProbeOutcome {
            headers: HeaderMap::new(),
            total_size: 1024,
            supports_range,
            filename: "a.mp4".to_string(),
        }
    }

    #[test]
    fn fresh_entry_hits() {
        let cache = HeaderCache::new();
        cache.store("http://host/a.mp4", &outcome(true));

        let hit = cache.lookup("http://host/a.mp4").expect("fresh entry");
        assert_eq!(hit.total_size, 1024);
    }

    #[test]
    fn non_range_upstream_is_never_cached() {
        let cache = HeaderCache::new();
        cache.store("http://host/a.mp4", &outcome(false));

        assert!(cache.is_empty());
        assert!(cache.lookup("http://host/a.mp4").is_none());
    }

    #[test]
    fn stale_entry_misses_but_survives_until_ttl() {
        let cache = HeaderCache::with_limits(Duration::from_secs(3600), Duration::ZERO);
        cache.store("http://host/a.mp4", &outcome(true));

        // Older than the freshness window: miss, but the entry stays.
        assert!(cache.lookup("http://host/a.mp4").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let cache = HeaderCache::with_limits(Duration::ZERO, Duration::ZERO);
        cache.store("http://host/a.mp4", &outcome(true));

        assert!(cache.lookup("http://host/a.mp4").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn refresh_overwrites_in_place() {
        let cache = HeaderCache::new();
        cache.store("http://host/a.mp4", &outcome(true));

        let mut refreshed = outcome(true);
        refreshed.total_size = 2048;
        cache.store("http://host/a.mp4", &refreshed);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("http://host/a.mp4").unwrap().total_size, 2048);
    }
}
