//! cache_list tool implementation.
//!
//! Lists every cache with its totals, or the keys of one cache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, CacheStats};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the keys of this cache instead of the per-cache totals.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Caches { caches: Vec<CacheStats> },
    Keys { cache_name: String, keys: Vec<String> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl(cache: &CacheDb, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let output = match params.cache_name {
        Some(cache_name) => {
            let keys = cache.list_keys(&cache_name).await?;
            CacheListOutput::Keys { cache_name, keys }
        }
        None => CacheListOutput::Caches { caches: cache.cache_stats().await? },
    };

    json_result(&output)
}
