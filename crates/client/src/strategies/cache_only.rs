use async_trait::async_trait;
use swcache_core::Error;

use super::{NamedCache, Strategy};
use crate::fetch::{Request, Response};

/// Serve from the cache or fail with `NotFound`.
pub struct CacheOnly {
    cache: NamedCache,
}

impl CacheOnly {
    pub fn new(cache: NamedCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Strategy for CacheOnly {
    fn name(&self) -> &'static str {
        "cache-only"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        self.cache
            .lookup(request)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} not in {}", request.url, self.cache.name())))
    }
}
