//! The tiny, always-prefetching cache Bootstrap keeps in front of its
//! internal resolver chain. This is deliberately not a general response
//! cache, it only ever holds IP lists for bootstrap-upstream hostnames,
//! with a floor on how long an entry is kept regardless of the record
//! TTL it came with.
use std::{
    future::Future,
    net::IpAddr,
    sync::Arc,
    time::Duration,
};

use moka::future::Cache;
use tokio::time::Instant;

/// Minimum time an entry stays cached, regardless of the upstream's TTL.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Once an entry has this much life left, a lookup triggers a background
/// refresh instead of waiting for the entry to go stale.
const PREFETCH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapCacheKey {
    pub host: Arc<str>,
    pub query: IpQuery,
}

/// Which record types a bootstrap lookup asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpQuery {
    V4Only,
    V6Only,
    Dual,
}

#[derive(Clone)]
struct CacheEntry {
    ips: Arc<[IpAddr]>,
    expires_at: Instant,
}

/// In-process cache of resolved bootstrap-upstream IPs.
pub struct BootstrapCache {
    cache: Cache<BootstrapCacheKey, CacheEntry>,
}

impl BootstrapCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::new(1024),
        }
    }

    /// Returns a cached IP list, refreshing it via `refresh` when missing or
    /// stale. When the entry is present but within [`PREFETCH_MARGIN`] of
    /// expiry, the stale-but-valid value is returned immediately and
    /// `refresh` is re-run in the background to repopulate the entry:
    /// prefetching is always enabled, there's no on-demand-only mode.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: BootstrapCacheKey,
        refresh: F,
    ) -> anyhow::Result<Arc<[IpAddr]>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<IpAddr>>> + Send + 'static,
    {
        let now = Instant::now();

        if let Some(entry) = self.cache.get(&key).await {
            if entry.expires_at > now {
                if entry.expires_at.saturating_duration_since(now) < PREFETCH_MARGIN {
                    self.spawn_prefetch(key, refresh);
                }
                return Ok(entry.ips);
            }
        }

        let ips = refresh().await?;
        if ips.is_empty() {
            anyhow::bail!("no such host");
        }
        let ips: Arc<[IpAddr]> = ips.into();
        self.cache
            .insert(
                key,
                CacheEntry {
                    ips: ips.clone(),
                    expires_at: now + MIN_CACHE_TTL,
                },
            )
            .await;
        Ok(ips)
    }

    fn spawn_prefetch<F, Fut>(&self, key: BootstrapCacheKey, refresh: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<IpAddr>>> + Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            match refresh().await {
                Ok(ips) if !ips.is_empty() => {
                    let now = Instant::now();
                    cache
                        .insert(
                            key,
                            CacheEntry {
                                ips: ips.into(),
                                expires_at: now + MIN_CACHE_TTL,
                            },
                        )
                        .await;
                }
                Ok(_) => {
                    tracing::warn!("bootstrap prefetch returned no addresses, keeping stale entry");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bootstrap prefetch failed, keeping stale entry");
                }
            }
        });
    }
}

impl Default for BootstrapCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn caches_until_min_ttl() {
        let cache = BootstrapCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let key = BootstrapCacheKey {
            host: "resolver.example.".into(),
            query: IpQuery::Dual,
        };

        for _ in 0..3 {
            let calls = calls.clone();
            let ips = cache
                .get_or_refresh(key.clone(), move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(vec!["203.0.113.1".parse().unwrap()])
                    }
                })
                .await
                .unwrap();
            assert_eq!(&*ips, &["203.0.113.1".parse::<IpAddr>().unwrap()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_refresh_is_an_error() {
        let cache = BootstrapCache::new();
        let key = BootstrapCacheKey {
            host: "nowhere.example.".into(),
            query: IpQuery::V4Only,
        };

        let result = cache
            .get_or_refresh(key, || async { Ok(Vec::new()) })
            .await;
        assert!(result.is_err());
    }
}
