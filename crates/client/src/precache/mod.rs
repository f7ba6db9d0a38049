//! Precache manager.
//!
//! Downloads the assets named in a manifest ahead of time and keeps them in
//! a dedicated cache. Each asset is stored under its URL, or under its URL
//! plus a `__revision` query parameter when the manifest entry carries a
//! revision, so bumping a revision makes the old copy unreachable and the
//! next populate fetches the new one.
//!
//! - `populate` is idempotent: entries already stored under their exact
//!   key are never fetched again.
//! - `cleanup` removes everything not named by the current manifest, and
//!   refuses to run until a populate has succeeded in this process.
//! - `lookup` maps a request URL to a precache key, trying the variants in
//!   [`variants`].

pub mod variants;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use swcache_core::{AppConfig, CacheDb, Error, ManifestEntry};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::fetch::{Fetcher, Request, Response, resolve};
use crate::strategies::{Strategy, network_failure};

pub use variants::MatchOptions;

/// Query parameter carrying the revision in a precache key.
pub const REVISION_PARAM: &str = "__revision";

/// Tuning for populate and lookup.
#[derive(Debug, Clone)]
pub struct PrecacheOptions {
    pub cache_name: String,
    /// Maximum downloads in flight during populate.
    pub concurrency: usize,
    /// Extra attempts per asset after a transient failure.
    pub retries: u32,
    /// Delay before the first retry; doubled on every further attempt.
    pub retry_backoff: Duration,
    pub matching: MatchOptions,
}

impl Default for PrecacheOptions {
    fn default() -> Self {
        Self {
            cache_name: "sw-cache-precache".into(),
            concurrency: 4,
            retries: 2,
            retry_backoff: Duration::from_millis(250),
            matching: MatchOptions::default(),
        }
    }
}

impl PrecacheOptions {
    /// Build options from application config, compiling the ignored-parameter patterns.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let ignore_url_parameters = config
            .ignore_url_parameters
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidInput(format!("ignore_url_parameters {p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cache_name: config.precache_name(),
            concurrency: config.precache_concurrency.max(1),
            retries: config.fetch_retries,
            retry_backoff: config.retry_backoff(),
            matching: MatchOptions {
                ignore_url_parameters,
                directory_index: config.directory_index.clone(),
                clean_urls: config.clean_urls,
            },
        })
    }
}

/// A manifest entry resolved against the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheEntry {
    pub url: Url,
    pub revision: Option<String>,
    /// Key the asset is stored under.
    pub key: String,
}

/// Compute the storage key for `url` at `revision`.
pub fn precache_key(url: &Url, revision: Option<&str>) -> String {
    match revision {
        Some(revision) => {
            let mut keyed = url.clone();
            keyed.query_pairs_mut().append_pair(REVISION_PARAM, revision);
            keyed.to_string()
        }
        None => url.to_string(),
    }
}

/// What a populate call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateReport {
    /// URLs downloaded by this call.
    pub fetched: Vec<String>,
    /// URLs already stored under their current key.
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
struct Manifest {
    entries: Vec<PrecacheEntry>,
    /// URL (without revision) to storage key.
    keys_by_url: HashMap<String, String>,
    /// Every entry is known to be stored.
    installed: bool,
}

impl Manifest {
    fn new(entries: Vec<PrecacheEntry>, installed: bool) -> Self {
        let keys_by_url = entries
            .iter()
            .map(|e| (e.url.to_string(), e.key.clone()))
            .collect();
        Self { entries, keys_by_url, installed }
    }
}

/// Owns the precache: its manifest, its downloads and its lookups.
pub struct PrecacheManager {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
    options: PrecacheOptions,
    /// Manifest used for lookups: the seeded one until a populate succeeds.
    current: RwLock<Manifest>,
}

impl PrecacheManager {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, origin: Url, options: PrecacheOptions) -> Self {
        Self { db, fetcher, origin, options, current: RwLock::new(Manifest::default()) }
    }

    pub fn cache_name(&self) -> &str {
        &self.options.cache_name
    }

    /// Whether a populate has succeeded since this manager was built.
    pub fn is_installed(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).installed
    }

    /// Make `manifest` current for lookups without downloading anything.
    ///
    /// Lets a restarted process serve what an earlier process stored. A
    /// seeded manifest does not count as installed, so `cleanup` still
    /// waits for a successful populate.
    pub fn seed(&self, manifest: &[ManifestEntry]) -> Result<(), Error> {
        let entries = self.resolve_manifest(manifest)?;
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !current.installed {
            *current = Manifest::new(entries, false);
        }
        Ok(())
    }

    /// Entries of the current manifest, in manifest order.
    pub fn entries(&self) -> Vec<PrecacheEntry> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    /// Resolve and validate a manifest.
    ///
    /// Duplicate URLs with the same revision collapse into one entry;
    /// duplicates with different revisions are rejected, as are globs.
    pub fn resolve_manifest(&self, manifest: &[ManifestEntry]) -> Result<Vec<PrecacheEntry>, Error> {
        let mut resolved: Vec<PrecacheEntry> = Vec::with_capacity(manifest.len());
        let mut seen: HashMap<String, usize> = HashMap::new();

        for entry in manifest {
            if entry.is_glob() {
                return Err(Error::InvalidInput(format!(
                    "{} is a glob; manifest entries must be concrete URLs",
                    entry.url()
                )));
            }

            let url = resolve(&self.origin, entry.url()).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url())))?;
            let revision = entry.revision().map(str::to_string);

            if let Some(&index) = seen.get(url.as_str()) {
                if resolved[index].revision != revision {
                    return Err(Error::InvalidInput(format!(
                        "{} appears twice with different revisions ({:?} and {:?})",
                        url, resolved[index].revision, revision
                    )));
                }
                tracing::debug!("ignoring duplicate manifest entry {}", url);
                continue;
            }

            let key = precache_key(&url, revision.as_deref());
            seen.insert(url.to_string(), resolved.len());
            resolved.push(PrecacheEntry { url, revision, key });
        }

        Ok(resolved)
    }

    /// Download and store every manifest entry not already stored under its key.
    ///
    /// On success the manifest becomes the current one and the manager
    /// counts as installed. On failure the previous manifest stays current;
    /// entries stored before the failure are kept and will be skipped next
    /// time.
    ///
    /// # Errors
    ///
    /// `FetchFailed` when an asset cannot be downloaded within the retry
    /// budget or answers with a status other than 200.
    pub async fn populate(&self, manifest: &[ManifestEntry]) -> Result<PopulateReport, Error> {
        let entries = self.resolve_manifest(manifest)?;
        let mut report = PopulateReport::default();

        let mut missing = Vec::new();
        for entry in &entries {
            if self.db.has_entry(self.cache_name(), &entry.key).await? {
                report.skipped.push(entry.url.to_string());
            } else {
                missing.push(entry.clone());
            }
        }

        tracing::info!(
            "precaching {} of {} entries into {}",
            missing.len(),
            entries.len(),
            self.cache_name()
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut join_set = JoinSet::new();

        for entry in missing {
            let semaphore = semaphore.clone();
            let db = self.db.clone();
            let fetcher = self.fetcher.clone();
            let cache_name = self.options.cache_name.clone();
            let retries = self.options.retries;
            let backoff = self.options.retry_backoff;

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::FetchFailed(format!("{}: {e}", entry.url)))?;

                let request = Request::get(entry.url.clone())
                    .with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                let response = fetch_with_retry(fetcher.as_ref(), &request, retries, backoff).await?;

                let stored = response
                    .to_entry(&cache_name, &entry.key)
                    .with_revision(entry.revision.clone());
                db.put_entry(&stored).await?;

                tracing::debug!("precached {} as {}", entry.url, entry.key);
                Ok::<_, Error>(entry.url.to_string())
            });
        }

        let mut fetched = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined.map_err(|e| Error::FetchFailed(format!("precache task failed: {e}")))?;
            match outcome {
                Ok(url) => fetched.push(url),
                Err(e) => {
                    join_set.shutdown().await;
                    tracing::warn!("precache failed: {}", e);
                    return Err(e);
                }
            }
        }

        // Report downloads in manifest order rather than completion order.
        report.fetched = entries
            .iter()
            .map(|e| e.url.to_string())
            .filter(|url| fetched.contains(url))
            .collect();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Manifest::new(entries, true);

        Ok(report)
    }

    /// Delete stored entries whose key is not in the current manifest.
    ///
    /// Returns the number of deleted entries.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when no populate has succeeded yet; the stored
    /// entries may be all a failed install left to serve.
    pub async fn cleanup(&self) -> Result<u64, Error> {
        let keep: Vec<String> = {
            let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if !current.installed {
                return Err(Error::InvalidInput(format!(
                    "{} has not been installed; refusing cleanup",
                    self.cache_name()
                )));
            }
            current.entries.iter().map(|e| e.key.clone()).collect()
        };
        let deleted = self.db.delete_entries_except(self.cache_name(), &keep).await?;
        if deleted > 0 {
            tracing::info!("removed {} outdated entries from {}", deleted, self.cache_name());
        }
        Ok(deleted)
    }

    /// Storage key serving `url`, if any variant of it is precached.
    pub fn lookup(&self, url: &Url) -> Option<String> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        if current.keys_by_url.is_empty() {
            return None;
        }

        variants::candidates(url, &self.options.matching)
            .iter()
            .find_map(|candidate| current.keys_by_url.get(candidate.as_str()).cloned())
    }

    /// Serve `request` from the precache.
    ///
    /// Returns None when the URL is not precached. A precached URL whose
    /// stored copy has gone missing is fetched from the network without
    /// being stored.
    pub async fn respond(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method != Method::GET {
            return Ok(None);
        }
        let Some(key) = self.lookup(&request.url) else {
            return Ok(None);
        };

        if let Some(entry) = self.db.get_entry(self.cache_name(), &key).await? {
            tracing::debug!("precache hit for {} ({})", request.url, key);
            return Response::from_entry(entry).map(Some);
        }

        tracing::warn!("precached {} missing from {}; using network", key, self.cache_name());
        self.fetcher
            .fetch(request)
            .await
            .map(Some)
            .map_err(network_failure)
    }
}

/// Fetch with retries on network failures, 5xx and 429.
async fn fetch_with_retry(
    fetcher: &dyn Fetcher, request: &Request, retries: u32, backoff: Duration,
) -> Result<Response, Error> {
    let mut attempt = 0u32;
    loop {
        let (retryable, failure) = match fetcher.fetch(request).await {
            Ok(response) if response.status == StatusCode::OK => return Ok(response),
            Ok(response) => (
                response.status.is_server_error() || response.status == StatusCode::TOO_MANY_REQUESTS,
                format!("{} returned status {}", request.url, response.status.as_u16()),
            ),
            Err(e) => (
                e.is_network() && !matches!(e, Error::FetchTooLarge(_)),
                format!("{} after {} attempts: {}", request.url, attempt + 1, e),
            ),
        };

        if !retryable || attempt >= retries {
            return Err(Error::FetchFailed(failure));
        }

        let delay = backoff.saturating_mul(2u32.saturating_pow(attempt));
        tracing::warn!("precache fetch of {} failed (attempt {}), retrying in {:?}", request.url, attempt + 1, delay);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Route handler serving precached URLs.
pub struct PrecacheStrategy {
    manager: Arc<PrecacheManager>,
}

impl PrecacheStrategy {
    pub fn new(manager: Arc<PrecacheManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Strategy for PrecacheStrategy {
    fn name(&self) -> &'static str {
        "precache"
    }

    async fn handle(&self, request: &Request) -> Result<Response, Error> {
        self.manager
            .respond(request)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} is not precached", request.url)))
    }
}
