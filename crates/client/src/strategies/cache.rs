//! A named cache as seen by a strategy.

use reqwest::Method;
use swcache_core::{CacheDb, Error};

use super::expiration::Expiration;
use crate::fetch::{Request, Response};

/// Read/write access to one named cache, with its expiration policy.
///
/// Only GET requests are ever read from or written to a cache.
#[derive(Debug, Clone)]
pub struct NamedCache {
    db: CacheDb,
    name: String,
    expiration: Expiration,
}

impl NamedCache {
    pub fn new(db: CacheDb, name: impl Into<String>, expiration: Expiration) -> Self {
        Self { db, name: name.into(), expiration }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expiration(&self) -> &Expiration {
        &self.expiration
    }

    /// Look up the stored response for `request`.
    ///
    /// Entries past their max age are deleted and reported as absent.
    pub async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method != Method::GET {
            return Ok(None);
        }

        let key = request.cache_key();
        let Some(entry) = self.db.get_entry(&self.name, &key).await? else {
            tracing::debug!("cache miss in {} for {}", self.name, key);
            return Ok(None);
        };

        if self.expiration.is_expired(&entry) {
            tracing::debug!("expired entry in {} for {}", self.name, key);
            self.db.delete_entry(&self.name, &key).await?;
            return Ok(None);
        }

        tracing::debug!("cache hit in {} for {}", self.name, key);
        Response::from_entry(entry).map(Some)
    }

    /// Like [`NamedCache::lookup`], but a failing store reads as a miss.
    pub async fn lookup_or_miss(&self, request: &Request) -> Option<Response> {
        match self.lookup(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("cache read failed in {} for {}: {}", self.name, request.url, e);
                None
            }
        }
    }

    /// Store `response` for `request` if it is cacheable, then apply expiration.
    ///
    /// Returns whether anything was written.
    pub async fn store(&self, request: &Request, response: &Response) -> Result<bool, Error> {
        if request.method != Method::GET || !response.is_cacheable() {
            tracing::debug!(
                "not caching {} {} (status {})",
                request.method,
                request.url,
                response.status.as_u16()
            );
            return Ok(false);
        }

        self.db
            .put_entry(&response.to_entry(&self.name, &request.cache_key()))
            .await?;

        if !self.expiration.is_unbounded() {
            self.expiration.enforce(&self.db, &self.name).await?;
        }

        Ok(true)
    }

    /// Like [`NamedCache::store`], but failures are only logged.
    pub async fn store_or_warn(&self, request: &Request, response: &Response) {
        if let Err(e) = self.store(request, response).await {
            tracing::warn!("cache write failed in {} for {}: {}", self.name, request.url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseSource;
    use crate::testing::{get, url};
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;

    fn response(path: &str, status: StatusCode) -> Response {
        Response {
            url: url(path),
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"body"),
            source: ResponseSource::Network,
            stored_at: None,
            fetch_ms: Some(1),
        }
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = NamedCache::new(db, "runtime", Expiration::default());
        let request = get("app.js");

        assert!(cache.store(&request, &response("app.js", StatusCode::OK)).await.unwrap());

        let hit = cache.lookup(&request).await.unwrap().unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.body, Bytes::from_static(b"body"));
    }

    #[tokio::test]
    async fn test_does_not_store_errors_or_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = NamedCache::new(db.clone(), "runtime", Expiration::default());

        assert!(!cache.store(&get("missing.js"), &response("missing.js", StatusCode::NOT_FOUND)).await.unwrap());

        let post = Request::new(Method::POST, url("api"));
        assert!(!cache.store(&post, &response("api", StatusCode::OK)).await.unwrap());
        assert!(db.list_keys("runtime").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_drops_expired_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = get("old.js");

        let mut entry = response("old.js", StatusCode::OK).to_entry("runtime", &request.cache_key());
        entry.stored_at = chrono::Utc::now() - chrono::Duration::seconds(120);
        db.put_entry(&entry).await.unwrap();

        let expiration = Expiration { max_age: Some(chrono::Duration::seconds(60)), ..Default::default() };
        let cache = NamedCache::new(db.clone(), "runtime", expiration);

        assert!(cache.lookup(&request).await.unwrap().is_none());
        assert!(!db.has_entry("runtime", &request.cache_key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_enforces_max_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let expiration = Expiration { max_entries: Some(2), ..Default::default() };
        let cache = NamedCache::new(db.clone(), "runtime", expiration);

        for path in ["a.js", "b.js", "c.js"] {
            cache.store(&get(path), &response(path, StatusCode::OK)).await.unwrap();
        }

        let keys = db.list_keys("runtime").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys.contains(&url("a.js").to_string()));
    }
}
