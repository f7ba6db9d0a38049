use std::sync::Arc;

use async_trait::async_trait;
use swcache_core::Error;

use super::{NamedCache, Revalidator, Strategy, fetch_and_store, network_failure};
use crate::fetch::{Fetcher, Request, Response};

/// Serve the cached copy immediately and refresh it in the background.
///
/// On a miss the request waits for the network like cache-first. Refreshes
/// are coalesced per cache key and their failures are only logged.
pub struct StaleWhileRevalidate {
    cache: NamedCache,
    fetcher: Arc<dyn Fetcher>,
    revalidator: Revalidator,
}

impl StaleWhileRevalidate {
    pub fn new(cache: NamedCache, fetcher: Arc<dyn Fetcher>, revalidator: Revalidator) -> Self {
        Self { cache, fetcher, revalidator }
    }

    fn revalidation_key(&self, request: &Request) -> String {
        format!("{}\n{}", self.cache.name(), request.cache_key())
    }

    fn revalidate(&self, request: &Request) {
        let fetcher = self.fetcher.clone();
        let cache = self.cache.clone();
        let request = request.clone();
        let key = self.revalidation_key(&request);

        self.revalidator.spawn(key, async move {
            match fetcher.fetch(&request).await {
                Ok(response) => cache.store_or_warn(&request, &response).await,
                Err(e) => tracing::warn!("background refresh of {} failed: {}", request.url, e),
            }
        });
    }
}

#[async_trait]
impl Strategy for StaleWhileRevalidate {
    fn name(&self) -> &'static str {
        "stale-while-revalidate"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.cache.lookup_or_miss(request).await {
            self.revalidate(request);
            return Ok(cached);
        }

        fetch_and_store(self.fetcher.as_ref(), &self.cache, request)
            .await
            .map_err(network_failure)
    }
}
