//! precache_install and precache_cleanup tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::CacheRuntime;

use super::json_result;

/// Output from the precache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheInstallOutput {
    pub cache_name: String,
    /// URLs downloaded by this call.
    pub fetched: Vec<String>,
    /// URLs already stored at their current revision.
    pub skipped: Vec<String>,
}

/// Output from the precache_cleanup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrecacheCleanupOutput {
    pub cache_name: String,
    /// Number of outdated entries deleted.
    pub deleted: u64,
}

/// Populate the precache with the configured manifest.
pub async fn install_impl(runtime: &CacheRuntime) -> Result<CallToolResult, McpError> {
    let report = runtime.install().await?;
    json_result(&PrecacheInstallOutput {
        cache_name: runtime.precache().cache_name().to_string(),
        fetched: report.fetched,
        skipped: report.skipped,
    })
}

/// Delete precached entries the current manifest no longer names.
///
/// Rejected until precache_install has succeeded in this process.
pub async fn cleanup_impl(runtime: &CacheRuntime) -> Result<CallToolResult, McpError> {
    let deleted = runtime.activate().await?;
    json_result(&PrecacheCleanupOutput { cache_name: runtime.precache().cache_name().to_string(), deleted })
}
