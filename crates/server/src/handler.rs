//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CacheListParams, CachePurgeParams, get_impl, list_impl, purge_impl};
use crate::tools::fetch::fetch_impl;
use crate::tools::precache::{cleanup_impl, install_impl};
use crate::tools::SwFetchParams;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_client::CacheRuntime;

/// The main MCP server handler for sw-cache.
#[derive(Clone)]
pub struct SwCacheServer {
    runtime: Arc<CacheRuntime>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler around a built runtime.
    pub fn new(runtime: Arc<CacheRuntime>) -> Self {
        Self { runtime, tool_router: Self::tool_router() }
    }

    /// Serve a request through the caching runtime.
    #[tool(
        description = "Serve a request through the cache: the first matching route's strategy decides between cache and network. Unrouted requests go to the network."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.runtime, params.0).await
    }

    #[tool(description = "Download every configured precache entry not already stored at its current revision.")]
    async fn precache_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.runtime).await
    }

    #[tool(description = "Delete precached entries that the current manifest no longer names. Requires a successful precache_install first.")]
    async fn precache_cleanup(&self) -> Result<CallToolResult, McpError> {
        cleanup_impl(&self.runtime).await
    }

    #[tool(description = "Return one stored response, by id or by cache_name and key.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.runtime.db(), params.0).await
    }

    #[tool(description = "List caches with entry counts and sizes, or the keys of one cache.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(self.runtime.db(), params.0).await
    }

    #[tool(description = "Purge stored responses by age, domain or count, or drop a whole cache.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.runtime.db(), params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sw-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(format!("Caching runtime for {}", self.runtime.origin())),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
