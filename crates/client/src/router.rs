//! Request router.
//!
//! Routes are tried in registration order; the first whose method and
//! matcher accept the request decides the strategy. A request that matches
//! nothing is left to the caller, which sends it to the network untouched.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use reqwest::{Method, Url};
use swcache_core::Error;

use crate::fetch::{Request, Response, same_origin};
use crate::strategies::Strategy;

/// Predicate matcher signature.
pub type MatchFn = dyn Fn(&Request) -> bool + Send + Sync;

/// Decides whether a route applies to a request URL.
#[derive(Clone)]
pub enum RouteMatcher {
    /// Matches anywhere in a same-origin URL; cross-origin URLs only match
    /// when the match starts at the first character.
    Regex(Regex),
    /// Matches one URL exactly (fragment ignored).
    Exact(Url),
    Predicate(Arc<MatchFn>),
}

impl RouteMatcher {
    pub fn predicate(f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Compile a regex matcher.
    pub fn regex(pattern: &str) -> Result<Self, Error> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| Error::InvalidInput(format!("invalid route pattern {pattern}: {e}")))
    }

    fn matches(&self, origin: &Url, request: &Request) -> bool {
        match self {
            Self::Regex(re) => {
                let url = request.url.as_str();
                if same_origin(origin, &request.url) {
                    re.is_match(url)
                } else {
                    re.find(url).is_some_and(|m| m.start() == 0)
                }
            }
            Self::Exact(url) => {
                let mut target = url.clone();
                target.set_fragment(None);
                target == request.url
            }
            Self::Predicate(f) => f(request),
        }
    }
}

impl fmt::Debug for RouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => write!(f, "Regex({})", re.as_str()),
            Self::Exact(url) => write!(f, "Exact({url})"),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

impl From<Regex> for RouteMatcher {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

impl From<Url> for RouteMatcher {
    fn from(url: Url) -> Self {
        Self::Exact(url)
    }
}

/// A registered rule.
pub struct Route {
    pub matcher: RouteMatcher,
    pub method: Method,
    pub strategy: Arc<dyn Strategy>,
}

/// Ordered set of routes for one origin.
pub struct Router {
    origin: Url,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(origin: Url) -> Self {
        Self { origin, routes: Vec::new() }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Register a GET route.
    pub fn register_route(&mut self, matcher: impl Into<RouteMatcher>, strategy: Arc<dyn Strategy>) {
        self.register_route_with_method(matcher, Method::GET, strategy);
    }

    pub fn register_route_with_method(
        &mut self, matcher: impl Into<RouteMatcher>, method: Method, strategy: Arc<dyn Strategy>,
    ) {
        let matcher = matcher.into();
        tracing::debug!("registered route {:?} {} -> {}", matcher, method, strategy.name());
        self.routes.push(Route { matcher, method, strategy });
    }

    /// Strategy of the first route accepting `request`.
    pub fn match_request(&self, request: &Request) -> Option<Arc<dyn Strategy>> {
        self.routes
            .iter()
            .find(|route| route.method == request.method && route.matcher.matches(&self.origin, request))
            .map(|route| route.strategy.clone())
    }

    /// Serve `request` through its route; None when no route matches.
    pub async fn handle(&self, request: &Request) -> Option<Result<Response, Error>> {
        let strategy = self.match_request(request)?;
        tracing::debug!("{} {} handled by {}", request.method, request.url, strategy.name());
        Some(strategy.handle(request).await)
    }
}
