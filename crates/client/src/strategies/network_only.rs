use std::sync::Arc;

use async_trait::async_trait;
use swcache_core::Error;

use super::{Strategy, network_failure};
use crate::fetch::{Fetcher, Request, Response};

/// Always go to the network; nothing is read from or written to a cache.
pub struct NetworkOnly {
    fetcher: Arc<dyn Fetcher>,
}

impl NetworkOnly {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Strategy for NetworkOnly {
    fn name(&self) -> &'static str {
        "network-only"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        self.fetcher.fetch(request).await.map_err(network_failure)
    }
}
