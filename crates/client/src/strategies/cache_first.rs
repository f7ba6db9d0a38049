use std::sync::Arc;

use async_trait::async_trait;
use swcache_core::Error;

use super::{NamedCache, Strategy, fetch_and_store, network_failure};
use crate::fetch::{Fetcher, Request, Response};

/// Serve from the cache; go to the network only on a miss.
pub struct CacheFirst {
    cache: NamedCache,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheFirst {
    pub fn new(cache: NamedCache, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { cache, fetcher }
    }
}

#[async_trait]
impl Strategy for CacheFirst {
    fn name(&self) -> &'static str {
        "cache-first"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.cache.lookup_or_miss(request).await {
            return Ok(cached);
        }

        fetch_and_store(self.fetcher.as_ref(), &self.cache, request)
            .await
            .map_err(network_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseSource;
    use crate::strategies::Expiration;
    use crate::testing::{MockFetcher, get};
    use swcache_core::CacheDb;

    async fn setup(fetcher: Arc<MockFetcher>) -> CacheFirst {
        let db = CacheDb::open_in_memory().await.unwrap();
        CacheFirst::new(NamedCache::new(db, "runtime", Expiration::default()), fetcher)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("style.css", 200, "body{}");
        let strategy = setup(fetcher.clone()).await;

        let first = strategy.handle(&get("style.css")).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);

        let second = strategy.handle(&get("style.css")).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.body.as_ref(), b"body{}");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_never_touches_network() {
        let fetcher = Arc::new(MockFetcher::new());
        let strategy = setup(fetcher.clone()).await;

        let seeded = MockFetcher::new();
        seeded.respond("app.js", 200, "cached");
        let response = seeded.fetch(&get("app.js")).await.unwrap();
        strategy.cache.store(&get("app.js"), &response).await.unwrap();

        let served = strategy.handle(&get("app.js")).await.unwrap();
        assert_eq!(served.body.as_ref(), b"cached");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_and_network_down() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail("app.js");
        let strategy = setup(fetcher).await;

        let result = strategy.handle(&get("app.js")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_error_status_served_but_not_cached() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("gone.js", 404, "not found");
        let strategy = setup(fetcher.clone()).await;

        let first = strategy.handle(&get("gone.js")).await.unwrap();
        assert_eq!(first.status.as_u16(), 404);
        strategy.handle(&get("gone.js")).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_max_age_beyond_calendar_range() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("a.js", 200, "a()");
        let options = swcache_core::StrategyOptions { max_age_seconds: Some(10_000_000_000_000), ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        let strategy = CacheFirst::new(NamedCache::new(db, "runtime", Expiration::from(&options)), fetcher.clone());

        assert_eq!(strategy.handle(&get("a.js")).await.unwrap().source, ResponseSource::Network);
        assert_eq!(strategy.handle(&get("a.js")).await.unwrap().source, ResponseSource::Cache);
        assert_eq!(fetcher.calls(), 1);
    }
}
