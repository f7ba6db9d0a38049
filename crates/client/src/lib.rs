//! Caching runtime for sw-cache.
//!
//! This crate provides the network side of the cache: the HTTP fetch
//! pipeline, the caching strategies, the precache manager and the router
//! that ties requests to strategies.

pub mod fetch;
pub mod precache;
pub mod router;
pub mod runtime;
pub mod strategies;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, Fetcher, Request, Response, ResponseSource};
pub use precache::{PopulateReport, PrecacheEntry, PrecacheManager, PrecacheOptions, PrecacheStrategy, precache_key};
pub use router::{Route, RouteMatcher, Router};
pub use runtime::CacheRuntime;
pub use strategies::{Strategy, StrategyContext, build_strategy};
