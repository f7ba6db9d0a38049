//! cache_purge tool implementation.
//!
//! Purges cache entries by age, domain, or count, optionally limited to one cache.

use chrono::{TimeDelta, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Limit age and count purges to this cache. On its own, drops the whole cache.
    #[serde(default)]
    pub cache_name: Option<String>,

    /// Purge entries stored more than this many seconds ago.
    #[serde(default)]
    pub older_than_seconds: Option<u64>,

    /// Purge entries whose URL is on this domain or a subdomain of it.
    #[serde(default)]
    pub domain: Option<String>,

    /// Keep only the newest N entries (LRU purge).
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let cache_name = params.cache_name.as_deref();
    let selective = params.older_than_seconds.is_some() || params.domain.is_some() || params.max_entries.is_some();

    let deleted = match cache_name {
        Some(name) if !selective => cache.delete_cache(name).await?,
        None if !selective => {
            return Err(Error::InvalidInput(
                "At least one of cache_name, older_than_seconds, domain, or max_entries must be specified".to_string(),
            )
            .into());
        }
        _ => {
            let mut deleted_total = 0u64;

            if let Some(seconds) = params.older_than_seconds {
                let cutoff = i64::try_from(seconds)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|age| Utc::now().checked_sub_signed(age))
                    .ok_or_else(|| Error::InvalidInput(format!("older_than_seconds out of range: {seconds}")))?;
                deleted_total += cache.purge_entries_older_than(cache_name, cutoff).await?;
            }

            if let Some(domain) = params.domain.as_deref() {
                deleted_total += cache.purge_entries_by_domain(domain).await?;
            }

            if let Some(max_entries) = params.max_entries {
                deleted_total += cache.purge_lru_entries(cache_name, max_entries).await?;
            }

            deleted_total
        }
    };

    tracing::info!("cache_purge deleted {} entries", deleted);
    json_result(&CachePurgeOutput { deleted })
}
