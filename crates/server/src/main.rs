//! mcp-stash server entry point.
//!
//! Loads configuration, installs the worker, and serves MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use stash_client::{FetchClient, FetchConfig, Router, RouterConfig, Worker};
use stash_core::{AppConfig, CacheDb, CacheStorage, MemoryCache};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let storage: Arc<dyn CacheStorage> = if config.in_memory() {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(CacheDb::open_path(&config.db_path).await?)
    };
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let router_config = RouterConfig::try_from(&config)?;

    tracing::info!(
        origin = %router_config.origin,
        static_cache = %router_config.static_cache,
        dynamic_cache = %router_config.dynamic_cache,
        "Starting mcp-stash server on stdio transport"
    );

    let worker = Arc::new(Worker::new(Router::new(router_config, storage, fetcher)));
    match worker.install().await {
        Ok(_) => {
            if worker.skip_waiting_requested()
                && let Err(e) = worker.activate().await
            {
                tracing::error!(error = %e, "activation failed");
            }
        }
        Err(e) => tracing::error!(error = %e, "install failed; requests will pass through"),
    }

    let handler = handler::McpStashServer::new(worker);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
