//! MCP transport hosts: streamable HTTP and stdio.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::Router;
use jenky_engine::Engine;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server::core::JenkyMcpCore;

/// Serve the MCP handler over stdio until the peer disconnects.
///
/// Tracing must already be routed to stderr; stdout belongs to the
/// transport.
pub async fn serve_stdio(engine: Arc<Engine>) -> Result<()> {
    let service = JenkyMcpCore::new(engine)
        .serve(stdio())
        .await
        .map_err(|error| anyhow!("failed to start stdio transport: {error}"))?;
    service
        .waiting()
        .await
        .map_err(|error| anyhow!("stdio transport failed: {error}"))?;
    Ok(())
}

/// Host configuration for the streamable-HTTP MCP server.
#[derive(Clone)]
pub struct McpHttpServer {
    bind_address: SocketAddr,
    engine: Arc<Engine>,
}

impl McpHttpServer {
    /// Create a server bound to the provided address.
    pub fn new(bind_address: SocketAddr, engine: Arc<Engine>) -> Self {
        Self { bind_address, engine }
    }

    /// Start the server and return a handle for shutdown.
    pub async fn start(self) -> Result<RunningMcpHttpServer> {
        let cancellation_token = CancellationToken::new();
        let session_manager = Arc::new(LocalSessionManager::default());

        let engine = Arc::clone(&self.engine);
        let service: StreamableHttpService<JenkyMcpCore, LocalSessionManager> = StreamableHttpService::new(
            move || Ok(JenkyMcpCore::new(Arc::clone(&engine))),
            Arc::clone(&session_manager),
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: None,
                cancellation_token: cancellation_token.child_token(),
                ..Default::default()
            },
        );

        let router = Router::new().nest_service("/mcp", service);
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;
        info!(address = %bound_address, "MCP HTTP server listening");

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await;
            }
        });

        Ok(RunningMcpHttpServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

/// Runtime handle for a running MCP HTTP server.
#[derive(Debug)]
pub struct RunningMcpHttpServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningMcpHttpServer {
    /// The bound socket address.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop the server and wait for the accept loop to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle
            .await
            .map_err(|error| anyhow!("MCP HTTP server task failed: {error}"))?;
        Ok(())
    }
}

/// Parse the bind address for the HTTP host.
///
/// Non-loopback binds are allowed (deployments behind a reverse proxy need
/// them) but called out loudly.
pub fn resolve_bind_address(host: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .map_err(|error| anyhow!("invalid bind host '{host}': {error}"))?;
    if !ip.is_loopback() {
        warn!(%ip, "binding the MCP HTTP server to a non-loopback address");
    }
    Ok(SocketAddr::new(ip, port))
}
