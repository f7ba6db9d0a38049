//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Longest accepted `max_age_seconds` for a route (100 years).
pub const MAX_AGE_SECONDS_LIMIT: u64 = 100 * 365 * 24 * 60 * 60;

/// Longest accepted `network_timeout_seconds` for a route.
pub const NETWORK_TIMEOUT_SECONDS_LIMIT: u64 = 300;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `cache_prefix` is empty
    /// - `precache_concurrency` is outside 1..=16 or `fetch_retries` exceeds 10
    /// - a precache URL is empty or still contains a glob
    /// - a route has an empty pattern or a `max_entries` of 0
    /// - a route's `max_age_seconds` exceeds 100 years or its
    ///   `network_timeout_seconds` exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }

        if !(1..=16).contains(&self.precache_concurrency) {
            return Err(invalid("precache_concurrency", "must be between 1 and 16"));
        }
        if self.fetch_retries > 10 {
            return Err(invalid("fetch_retries", "must not exceed 10"));
        }

        for entry in &self.precache {
            if entry.url().trim().is_empty() {
                return Err(invalid("precache", "entry url must not be empty"));
            }
            if entry.is_glob() {
                return Err(invalid(
                    "precache",
                    format!("{} is a glob; expand it into concrete URLs before loading", entry.url()),
                ));
            }
        }

        for route in &self.routes {
            if route.pattern.is_empty() {
                return Err(invalid("routes", "pattern must not be empty"));
            }
            if route.method.is_empty() {
                return Err(invalid("routes", format!("{}: method must not be empty", route.pattern)));
            }
            if route.options.max_entries == Some(0) {
                return Err(invalid("routes", format!("{}: max_entries must be greater than 0", route.pattern)));
            }
            if route.options.max_age_seconds.is_some_and(|secs| secs > MAX_AGE_SECONDS_LIMIT) {
                return Err(invalid(
                    "routes",
                    format!("{}: max_age_seconds must not exceed {MAX_AGE_SECONDS_LIMIT}", route.pattern),
                ));
            }
            if route.options.network_timeout_seconds.is_some_and(|secs| secs > NETWORK_TIMEOUT_SECONDS_LIMIT) {
                return Err(invalid(
                    "routes",
                    format!("{}: network_timeout_seconds must not exceed {NETWORK_TIMEOUT_SECONDS_LIMIT}", route.pattern),
                ));
            }
        }

        if self.precache.is_empty() && self.routes.is_empty() {
            tracing::warn!("No precache entries and no routes configured; every request falls through to the network");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RouteConfig, StrategyKind};
    use crate::manifest::ManifestEntry;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_origin_not_url() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_cache_prefix() {
        let config = AppConfig { cache_prefix: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_prefix"));
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let config = AppConfig { precache_concurrency: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = AppConfig { precache_concurrency: 16, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_glob_entry() {
        let mut config = AppConfig::default();
        config.precache.push(ManifestEntry::from("dist/*.png"));
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "precache"));
    }

    #[test]
    fn test_validate_rejects_zero_max_entries() {
        let mut route = RouteConfig::new(".*", StrategyKind::CacheFirst);
        route.options.max_entries = Some(0);
        let config = AppConfig { routes: vec![route], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "routes"));
    }

    #[test]
    fn test_validate_route_age_and_timeout_limits() {
        let mut route = RouteConfig::new(".*", StrategyKind::NetworkFirst);
        route.options.max_age_seconds = Some(MAX_AGE_SECONDS_LIMIT);
        route.options.network_timeout_seconds = Some(NETWORK_TIMEOUT_SECONDS_LIMIT);
        let config = AppConfig { routes: vec![route.clone()], ..Default::default() };
        assert!(config.validate().is_ok());

        let mut too_old = route.clone();
        too_old.options.max_age_seconds = Some(10_000_000_000_000);
        let config = AppConfig { routes: vec![too_old], ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "routes"));

        let mut too_slow = route;
        too_slow.options.network_timeout_seconds = Some(u64::MAX);
        let config = AppConfig { routes: vec![too_slow], ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "routes"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { max_bytes: 1, timeout_ms: 100, fetch_retries: 10, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
