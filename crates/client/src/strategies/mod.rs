//! Caching strategies.
//!
//! Each strategy decides how a single request is served from a named cache
//! and the network:
//!
//! - **cache-first**: serve the cached copy; on a miss fetch, store, serve.
//! - **network-first**: fetch (optionally with a deadline) and store; fall
//!   back to the cached copy when the network fails.
//! - **stale-while-revalidate**: serve the cached copy at once and refresh
//!   it in the background; on a miss wait for the network.
//! - **cache-only** / **network-only**: a single source, errors surface.
//!
//! Handling one request never touches shared state other than the store and
//! the revalidation set, so requests run fully concurrently.

pub mod cache;
mod cache_first;
mod cache_only;
pub mod expiration;
mod network_first;
mod network_only;
pub mod revalidate;
mod stale_while_revalidate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swcache_core::{CacheDb, Error, StrategyKind, StrategyOptions};

use crate::fetch::{Fetcher, Request, Response};

pub use cache::NamedCache;
pub use cache_first::CacheFirst;
pub use cache_only::CacheOnly;
pub use expiration::Expiration;
pub use network_first::NetworkFirst;
pub use network_only::NetworkOnly;
pub use revalidate::Revalidator;
pub use stale_while_revalidate::StaleWhileRevalidate;

/// A policy for serving one request.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short name used in logs and tool output.
    fn name(&self) -> &'static str;

    async fn handle(&self, request: &Request) -> Result<Response, Error>;
}

/// Everything a strategy needs from the runtime.
#[derive(Clone)]
pub struct StrategyContext {
    pub db: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    /// Cache used when the options name none.
    pub default_cache_name: String,
    /// Shared so that every stale-while-revalidate route coalesces on the same set.
    pub revalidator: Revalidator,
}

impl StrategyContext {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, default_cache_name: impl Into<String>) -> Self {
        Self { db, fetcher, default_cache_name: default_cache_name.into(), revalidator: Revalidator::new() }
    }

    fn cache(&self, options: &StrategyOptions) -> NamedCache {
        let name = options
            .cache_name
            .clone()
            .unwrap_or_else(|| self.default_cache_name.clone());
        NamedCache::new(self.db.clone(), name, Expiration::from(options))
    }
}

/// Construct the strategy `kind` configured by `options`.
pub fn build_strategy(kind: StrategyKind, options: &StrategyOptions, ctx: &StrategyContext) -> Arc<dyn Strategy> {
    if options.network_timeout_seconds.is_some() && kind != StrategyKind::NetworkFirst {
        tracing::warn!("network_timeout_seconds only applies to network-first; ignored for {}", kind);
    }

    match kind {
        StrategyKind::CacheFirst => Arc::new(CacheFirst::new(ctx.cache(options), ctx.fetcher.clone())),
        StrategyKind::NetworkFirst => Arc::new(
            NetworkFirst::new(ctx.cache(options), ctx.fetcher.clone())
                .with_network_timeout(options.network_timeout_seconds.map(Duration::from_secs)),
        ),
        StrategyKind::StaleWhileRevalidate => Arc::new(StaleWhileRevalidate::new(
            ctx.cache(options),
            ctx.fetcher.clone(),
            ctx.revalidator.clone(),
        )),
        StrategyKind::CacheOnly => Arc::new(CacheOnly::new(ctx.cache(options))),
        StrategyKind::NetworkOnly => Arc::new(NetworkOnly::new(ctx.fetcher.clone())),
    }
}

/// Fetch `request` and store the response if it is cacheable.
///
/// A failed cache write is logged; the response is still returned.
pub(crate) async fn fetch_and_store(
    fetcher: &dyn Fetcher, cache: &NamedCache, request: &Request,
) -> Result<Response, Error> {
    let response = fetcher.fetch(request).await?;
    cache.store_or_warn(request, &response).await;
    Ok(response)
}

/// Report a failed network attempt as `Network`, keeping its message.
pub(crate) fn network_failure(err: Error) -> Error {
    match err {
        Error::FetchTimeout(msg) | Error::FetchTooLarge(msg) | Error::FetchFailed(msg) => Error::Network(msg),
        other => other,
    }
}
