//! sw-cache server entry point.
//!
//! Boots the caching runtime and serves it as an MCP server on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{CacheRuntime, FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!("starting sw-cache for {} on stdio transport", config.origin);

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let runtime = Arc::new(CacheRuntime::from_config(&config, db, fetcher)?);

    if config.install_on_start {
        match runtime.install().await {
            Ok(report) => {
                tracing::info!("precache installed: {} fetched, {} already stored", report.fetched.len(), report.skipped.len());
                if let Err(e) = runtime.activate().await {
                    tracing::warn!("precache cleanup failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("precache install failed, serving earlier copies: {}", e),
        }
    }

    let handler = handler::SwCacheServer::new(runtime);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
