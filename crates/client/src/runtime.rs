//! The assembled caching runtime.
//!
//! [`CacheRuntime::from_config`] wires the store, the network, the
//! precache manager and the router together. There is no global instance;
//! the server owns one runtime and passes it to its tools.

use std::sync::Arc;

use reqwest::{Method, Url};
use swcache_core::{AppConfig, CacheDb, Error, ManifestEntry, RouteConfig};

use crate::fetch::{Fetcher, Request, Response};
use crate::precache::{PopulateReport, PrecacheManager, PrecacheOptions, PrecacheStrategy};
use crate::router::{RouteMatcher, Router};
use crate::strategies::{StrategyContext, build_strategy, network_failure};

/// Store, network, precache and routes for one origin.
pub struct CacheRuntime {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    manifest: Vec<ManifestEntry>,
    precache: Arc<PrecacheManager>,
    router: Router,
}

impl CacheRuntime {
    /// Build the runtime described by `config`.
    ///
    /// The precache route is registered first, so a precached URL is always
    /// served from the precache even when a configured route also matches it.
    /// The configured manifest is seeded for lookups right away, so entries
    /// stored by an earlier process are served before any install.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` for a bad origin, `InvalidInput` for a route pattern,
    /// route method or ignored-parameter pattern that does not parse, or for
    /// a manifest with globs or conflicting revisions.
    pub fn from_config(config: &AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;

        let precache = Arc::new(PrecacheManager::new(
            db.clone(),
            fetcher.clone(),
            origin.clone(),
            PrecacheOptions::from_config(config)?,
        ));
        precache.seed(&config.precache)?;

        let mut router = Router::new(origin.clone());
        let lookup = precache.clone();
        router.register_route(
            RouteMatcher::predicate(move |request| lookup.lookup(&request.url).is_some()),
            Arc::new(PrecacheStrategy::new(precache.clone())),
        );

        let ctx = StrategyContext::new(db.clone(), fetcher.clone(), config.runtime_cache_name());
        for route in &config.routes {
            register_configured(&mut router, route, &ctx)?;
        }

        tracing::info!(
            "runtime ready for {} with {} routes and {} precache entries",
            origin,
            router.routes().len(),
            config.precache.len()
        );

        Ok(Self { db, fetcher, origin, manifest: config.precache.clone(), precache, router })
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn precache(&self) -> &PrecacheManager {
        &self.precache
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Configured manifest.
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    /// Populate the precache with the configured manifest.
    pub async fn install(&self) -> Result<PopulateReport, Error> {
        self.precache.populate(&self.manifest).await
    }

    /// Drop precached entries left over from earlier manifests.
    ///
    /// Fails unless [`CacheRuntime::install`] has succeeded first.
    pub async fn activate(&self) -> Result<u64, Error> {
        self.precache.cleanup().await
    }

    /// Build a request for `url`, resolved against the origin.
    pub fn request(&self, method: &str, url: &str) -> Result<Request, Error> {
        Request::parse(method, url, &self.origin)
    }

    /// Name of the strategy that would serve `request`.
    pub fn strategy_for(&self, request: &Request) -> Option<&'static str> {
        self.router.match_request(request).map(|s| s.name())
    }

    /// Serve `request` through its route; None when no route matches.
    pub async fn handle(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.router.handle(request).await.transpose()
    }

    /// Serve `request`, sending unrouted requests straight to the network.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if let Some(response) = self.handle(request).await? {
            return Ok(response);
        }
        tracing::debug!("no route for {} {}; passing through", request.method, request.url);
        self.fetcher.fetch(request).await.map_err(network_failure)
    }
}

fn register_configured(router: &mut Router, route: &RouteConfig, ctx: &StrategyContext) -> Result<(), Error> {
    let matcher = RouteMatcher::regex(&route.pattern)?;
    let method = Method::from_bytes(route.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid route method: {}", route.method)))?;
    let strategy = build_strategy(route.strategy, &route.options, ctx);
    router.register_route_with_method(matcher, method, strategy);
    Ok(())
}
