//! Runtime route and strategy configuration.

use serde::{Deserialize, Serialize};

/// The caching policy a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    CacheOnly,
    NetworkOnly,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CacheFirst => "cache-first",
            StrategyKind::NetworkFirst => "network-first",
            StrategyKind::StaleWhileRevalidate => "stale-while-revalidate",
            StrategyKind::CacheOnly => "cache-only",
            StrategyKind::NetworkOnly => "network-only",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-strategy tuning.
///
/// Every field is optional; unset fields fall back to the runtime cache
/// name and to no expiration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StrategyOptions {
    /// Cache to read from and write to instead of the shared runtime cache.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Evict the oldest entries once the cache holds more than this many.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Entries older than this are treated as absent and purged.
    #[serde(default)]
    pub max_age_seconds: Option<u64>,

    /// Network-first only: give up on the network after this many seconds.
    #[serde(default)]
    pub network_timeout_seconds: Option<u64>,
}

/// A route declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Regular expression matched against the full request URL.
    pub pattern: String,

    /// HTTP method the route applies to.
    #[serde(default = "default_method")]
    pub method: String,

    pub strategy: StrategyKind,

    #[serde(default)]
    pub options: StrategyOptions,
}

fn default_method() -> String {
    "GET".into()
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, strategy: StrategyKind) -> Self {
        Self { pattern: pattern.into(), method: default_method(), strategy, options: StrategyOptions::default() }
    }
}
