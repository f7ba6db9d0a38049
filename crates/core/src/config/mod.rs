//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SW_CACHE_*)
//! 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The defaults describe a small single-page app: `index.html` and a
//! revisioned `elm-main.js` are precached, and any other script is served
//! network-first.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::ManifestEntry;

mod routes;
mod validation;

pub use routes::{RouteConfig, StrategyKind, StrategyOptions};
pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SW_CACHE_*)
/// 2. TOML config file (if SW_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SW_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that relative manifest URLs and string routes resolve against.
    ///
    /// Set via SW_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SW_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SW_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SW_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Prefix for the precache and runtime cache names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Assets fetched and stored at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<ManifestEntry>,

    /// Maximum number of precache downloads in flight.
    #[serde(default = "default_precache_concurrency")]
    pub precache_concurrency: usize,

    /// Extra attempts for a failed precache download.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Base delay between precache retries, doubled on every attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Query parameters (regular expressions) ignored when matching precached URLs.
    #[serde(default = "default_ignore_url_parameters")]
    pub ignore_url_parameters: Vec<String>,

    /// File appended to directory URLs when matching precached URLs.
    #[serde(default = "default_directory_index")]
    pub directory_index: Option<String>,

    /// Try `<path>.html` when matching extension-less precached URLs.
    #[serde(default = "default_true")]
    pub clean_urls: bool,

    /// Runtime routes, matched in order after the precache route.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,

    /// Populate the precache when the server starts.
    ///
    /// Set via SW_CACHE_INSTALL_ON_START environment variable.
    #[serde(default = "default_true")]
    pub install_on_start: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sw-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8000/".into()
}

fn default_user_agent() -> String {
    "sw-cache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_prefix() -> String {
    "sw-cache".into()
}

fn default_precache() -> Vec<ManifestEntry> {
    vec![ManifestEntry::from("index.html"), ManifestEntry::versioned("elm-main.js", "ass46")]
}

fn default_precache_concurrency() -> usize {
    4
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_ignore_url_parameters() -> Vec<String> {
    vec!["^utm_".into()]
}

fn default_directory_index() -> Option<String> {
    Some("index.html".into())
}

fn default_routes() -> Vec<RouteConfig> {
    vec![RouteConfig::new(r".*\.js", StrategyKind::NetworkFirst)]
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            cache_prefix: default_cache_prefix(),
            precache: default_precache(),
            precache_concurrency: default_precache_concurrency(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            ignore_url_parameters: default_ignore_url_parameters(),
            directory_index: default_directory_index(),
            clean_urls: true,
            routes: default_routes(),
            install_on_start: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Name of the cache holding precached assets.
    pub fn precache_name(&self) -> String {
        format!("{}-precache", self.cache_prefix)
    }

    /// Name of the cache shared by runtime routes without their own `cache_name`.
    pub fn runtime_cache_name(&self) -> String {
        format!("{}-runtime", self.cache_prefix)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SW_CACHE_`
    /// 2. TOML file from `SW_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SW_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SW_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document layered over the defaults, without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document is malformed or fails validation.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
