//! cache_get tool implementation.
//!
//! Retrieves one stored response by entry id, or by cache name and key.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::cache::hash::is_entry_id;
use swcache_core::{CacheDb, CachedEntry, Error};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Entry id (hex digest of cache name and key).
    #[serde(default)]
    pub id: Option<String>,

    /// Cache holding the entry; used together with `key`.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Key of the entry within `cache_name`.
    #[serde(default)]
    pub key: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub id: String,
    pub cache_name: String,
    pub key: String,
    pub url: String,
    pub revision: Option<String>,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub stored_at: String,
    pub age_seconds: i64,
    pub body_bytes: usize,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
}

impl From<CachedEntry> for CacheGetOutput {
    fn from(entry: CachedEntry) -> Self {
        Self {
            age_seconds: entry.age().num_seconds(),
            stored_at: entry.stored_at.to_rfc3339(),
            body_bytes: entry.body.len(),
            body: String::from_utf8_lossy(&entry.body).into_owned(),
            id: entry.id,
            cache_name: entry.cache_name,
            key: entry.key,
            url: entry.url,
            revision: entry.revision,
            status: entry.status,
            headers: entry.headers,
        }
    }
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let entry = match (&params.id, &params.cache_name, &params.key) {
        (Some(id), None, None) if !is_entry_id(id) => {
            return Err(Error::InvalidInput(format!("{id} is not an entry id (64 hex characters)")).into());
        }
        (Some(id), None, None) => cache
            .get_entry_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.clone()))?,
        (None, Some(cache_name), Some(key)) => cache
            .get_entry(cache_name, key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{cache_name}: {key}")))?,
        _ => {
            return Err(Error::InvalidInput("specify either id, or both cache_name and key".into()).into());
        }
    };

    json_result(&CacheGetOutput::from(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::output;
    use swcache_core::cache::hash::compute_entry_id;

    const CACHE: &str = "sw-cache-runtime";
    const URL: &str = "http://localhost:8000/app.js";

    async fn seeded() -> (CacheDb, CachedEntry) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let entry = CachedEntry::new(CACHE, URL, URL, 200, vec![("content-type".into(), "text/javascript".into())], b"app()".to_vec());
        cache.put_entry(&entry).await.unwrap();
        (cache, entry)
    }

    #[tokio::test]
    async fn test_get_impl_missing() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let id = compute_entry_id(CACHE, "http://localhost:8000/gone.js");
        let params = CacheGetParams { id: Some(id), ..Default::default() };

        let err = get_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_malformed_id() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let params = CacheGetParams { id: Some("nonexistent".to_string()), ..Default::default() };

        let err = get_impl(&cache, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_get_impl_by_id() {
        let (cache, entry) = seeded().await;

        let result = get_impl(&cache, CacheGetParams { id: Some(entry.id.clone()), ..Default::default() })
            .await
            .unwrap();
        let out: CacheGetOutput = output(&result);
        assert_eq!(out.key, URL);
        assert_eq!(out.body, "app()");
        assert_eq!(out.body_bytes, 5);
    }

    #[tokio::test]
    async fn test_get_impl_by_key() {
        let (cache, entry) = seeded().await;

        let params = CacheGetParams { id: None, cache_name: Some(CACHE.into()), key: Some(URL.into()) };
        let out: CacheGetOutput = output(&get_impl(&cache, params).await.unwrap());
        assert_eq!(out.id, entry.id);
        assert_eq!(out.status, 200);
    }

    #[tokio::test]
    async fn test_get_impl_ambiguous_params() {
        let cache = CacheDb::open_in_memory().await.unwrap();

        let result = get_impl(&cache, CacheGetParams::default()).await;
        assert!(result.is_err());

        let params = CacheGetParams { id: Some("x".into()), cache_name: Some(CACHE.into()), key: None };
        assert!(get_impl(&cache, params).await.is_err());
    }
}
