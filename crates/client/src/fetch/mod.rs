//! HTTP fetch pipeline.
//!
//! ### Requests and responses
//! - [`Request`] is the intercepted request: method, canonical URL, headers.
//! - [`Response`] is what a strategy serves, tagged with where it came from
//!   so callers can tell a cache hit from a network round trip.
//!
//! ### Network access
//! - Everything that talks to the network goes through the [`Fetcher`]
//!   trait so strategies and the precache manager can be driven by a fake
//!   network in tests.
//! - [`FetchClient`] is the reqwest implementation: user agent, timeout,
//!   redirect limit and a cap on body size.
//! - Non-2xx statuses are responses, not errors. Deciding whether a 404 is
//!   cacheable or fatal is up to the caller.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url, header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve, same_origin};

use swcache_core::{CachedEntry, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sw-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sw-cache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&swcache_core::AppConfig> for FetchConfig {
    fn from(config: &swcache_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Canonical URL (fragment removed).
    pub url: Url,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from user input, resolving relative URLs against `origin`.
    pub fn parse(method: &str, url: &str, origin: &Url) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;
        let url = resolve(origin, url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(method, url))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Key under which the response to this request is stored in a runtime cache.
    pub fn cache_key(&self) -> String {
        self.url.as_str().to_string()
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A response served to the caller.
#[derive(Debug, Clone)]
pub struct Response {
    /// The final URL after redirects (network) or the stored URL (cache).
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
    /// When the cached copy was written; None for network responses.
    pub stored_at: Option<DateTime<Utc>>,
    /// Time taken to fetch in milliseconds; None for cache hits.
    pub fetch_ms: Option<u64>,
}

impl Response {
    /// Only complete, successful responses are written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Rebuild a response from a stored entry.
    pub fn from_entry(entry: CachedEntry) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.id)))?;
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.id)))?;

        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!("dropping unreadable stored header {} on {}", name, entry.key),
            }
        }

        Ok(Self {
            url,
            status,
            headers,
            body: Bytes::from(entry.body),
            source: ResponseSource::Cache,
            stored_at: Some(entry.stored_at),
            fetch_ms: None,
        })
    }

    /// Snapshot this response for storage under `key` in `cache_name`.
    pub fn to_entry(&self, cache_name: &str, key: &str) -> CachedEntry {
        let headers = self
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        CachedEntry::new(cache_name, key, self.url.as_str(), self.status.as_u16(), headers, self.body.to_vec())
    }
}

/// Something that can put a request on the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn map_reqwest_error(url: &Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    /// Send the request, returning the response whatever its status.
    ///
    /// Respects the redirect and byte limits.
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&request.url, e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len()
        );

        Ok(Response {
            url: final_url,
            status,
            headers,
            body,
            source: ResponseSource::Network,
            stored_at: None,
            fetch_ms: Some(fetch_ms),
        })
    }
}
