//! sw_fetch tool implementation.
//!
//! Serves one request through the caching runtime, exactly as an
//! intercepted page request would be served.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{CacheRuntime, ResponseSource};
use swcache_core::Error;

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to request, absolute or relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests touch a cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Include the response body as text (default: true).
    #[serde(default = "default_true")]
    pub include_body: bool,
}

fn default_method() -> String {
    "GET".into()
}

fn default_true() -> bool {
    true
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The canonical request URL.
    pub url: String,
    /// URL of the served response (after redirects, or as stored).
    pub final_url: String,
    pub status: u16,
    /// "network" or "cache".
    pub source: String,
    /// Strategy of the matching route; None when the request passed through.
    pub strategy: Option<String>,
    pub content_type: Option<String>,
    /// When the served copy was stored (cache hits only).
    pub stored_at: Option<String>,
    pub fetch_ms: Option<u64>,
    pub body_bytes: usize,
    /// Body decoded as UTF-8, lossily.
    pub body: Option<String>,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(runtime: &CacheRuntime, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let request = runtime.request(&params.method, &params.url)?;
    let strategy = runtime.strategy_for(&request);
    let response = runtime.fetch(&request).await?;

    let output = SwFetchOutput {
        url: request.url.to_string(),
        final_url: response.url.to_string(),
        status: response.status.as_u16(),
        source: match response.source {
            ResponseSource::Network => "network".into(),
            ResponseSource::Cache => "cache".into(),
        },
        strategy: strategy.map(str::to_string),
        content_type: response.content_type().map(str::to_string),
        stored_at: response.stored_at.map(|t| t.to_rfc3339()),
        fetch_ms: response.fetch_ms,
        body_bytes: response.body.len(),
        body: params
            .include_body
            .then(|| String::from_utf8_lossy(&response.body).into_owned()),
    };

    json_result(&output)
}
