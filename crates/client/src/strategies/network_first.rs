use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swcache_core::Error;

use super::{NamedCache, Strategy, fetch_and_store};
use crate::fetch::{Fetcher, Request, Response};

/// Prefer the network; fall back to the cache when it fails or is too slow.
pub struct NetworkFirst {
    cache: NamedCache,
    fetcher: Arc<dyn Fetcher>,
    network_timeout: Option<Duration>,
}

impl NetworkFirst {
    pub fn new(cache: NamedCache, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache, fetcher, network_timeout: None }
    }

    /// Give up on the network after `timeout` and serve the cached copy instead.
    ///
    /// The abandoned fetch keeps running and still refreshes the cache.
    pub fn with_network_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.network_timeout = timeout;
        self
    }

    async fn fetch_with_deadline(&self, request: &Request, timeout: Duration) -> Result<Response, Error> {
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let detached = request.clone();
        let mut task = tokio::spawn(async move { fetch_and_store(fetcher.as_ref(), &cache, &detached).await });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Network(format!("{}: fetch task failed: {}", request.url, join_err))),
            Err(_) => {
                tracing::debug!("network timeout after {:?} for {}; fetch continues in background", timeout, request.url);
                Err(Error::FetchTimeout(format!("{} exceeded {:?}", request.url, timeout)))
            }
        }
    }
}

#[async_trait]
impl Strategy for NetworkFirst {
    fn name(&self) -> &'static str {
        "network-first"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        let outcome = match self.network_timeout {
            Some(timeout) => self.fetch_with_deadline(request, timeout).await,
            None => fetch_and_store(self.fetcher.as_ref(), &self.cache, request).await,
        };

        let err = match outcome {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if let Some(cached) = self.cache.lookup_or_miss(request).await {
            tracing::debug!("network failed for {} ({}); serving cached copy", request.url, err);
            return Ok(cached);
        }

        Err(match err {
            Error::FetchTimeout(msg) => Error::FetchTimeout(msg),
            Error::Network(msg) | Error::FetchTooLarge(msg) | Error::FetchFailed(msg) => Error::Network(msg),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseSource;
    use crate::strategies::Expiration;
    use crate::testing::{MockFetcher, get};
    use swcache_core::CacheDb;

    async fn cache() -> NamedCache {
        NamedCache::new(CacheDb::open_in_memory().await.unwrap(), "runtime", Expiration::default())
    }

    #[tokio::test]
    async fn test_network_success_updates_cache() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("elm-main.js", 200, "v1");
        let strategy = NetworkFirst::new(cache().await, fetcher.clone());

        let response = strategy.handle(&get("elm-main.js")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);

        let stored = strategy.cache.lookup(&get("elm-main.js")).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"v1");
    }

    #[tokio::test]
    async fn test_falls_back_to_cache() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("elm-main.js", 200, "v1");
        let strategy = NetworkFirst::new(cache().await, fetcher.clone());
        strategy.handle(&get("elm-main.js")).await.unwrap();

        fetcher.fail("elm-main.js");
        let response = strategy.handle(&get("elm-main.js")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body.as_ref(), b"v1");
    }

    #[tokio::test]
    async fn test_no_network_no_cache() {
        let strategy = NetworkFirst::new(cache().await, Arc::new(MockFetcher::new()));
        let result = strategy.handle(&get("elm-main.js")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_timeout_serves_cache_and_refreshes_later() {
        let fetcher = Arc::new(MockFetcher::gated());
        fetcher.respond("slow.js", 200, "fresh");
        let strategy = NetworkFirst::new(cache().await, fetcher.clone())
            .with_network_timeout(Some(Duration::from_millis(50)));

        let seed = MockFetcher::new();
        seed.respond("slow.js", 200, "stale");
        let stale = seed.fetch(&get("slow.js")).await.unwrap();
        strategy.cache.store(&get("slow.js"), &stale).await.unwrap();

        let response = strategy.handle(&get("slow.js")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body.as_ref(), b"stale");

        fetcher.release(1);
        let mut refreshed = false;
        for _ in 0..100 {
            let current = strategy.cache.lookup(&get("slow.js")).await.unwrap().unwrap();
            if current.body.as_ref() == b"fresh" {
                refreshed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(refreshed);
    }

    #[tokio::test]
    async fn test_timeout_without_cache() {
        let fetcher = Arc::new(MockFetcher::gated());
        fetcher.respond("slow.js", 200, "fresh");
        let strategy =
            NetworkFirst::new(cache().await, fetcher.clone()).with_network_timeout(Some(Duration::from_millis(20)));

        let result = strategy.handle(&get("slow.js")).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
        fetcher.release(1);
    }

    #[tokio::test]
    async fn test_deadline_not_hit_returns_network() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("fast.js", 200, "ok");
        let strategy =
            NetworkFirst::new(cache().await, fetcher).with_network_timeout(Some(Duration::from_secs(5)));

        let response = strategy.handle(&get("fast.js")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
    }
}
