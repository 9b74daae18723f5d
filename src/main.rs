use anyhow::{Context, Result};
use rmcp::{
    ServiceExt,
    transport::{
        stdio,
        streamable_http_server::tower::{StreamableHttpServerConfig, StreamableHttpService},
    },
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use concierge::Concierge;
use concierge::config::Config;
use concierge::service::ConciergeService;
use concierge::web;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr for MCP compatibility
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let concierge = Arc::new(Concierge::new(config));
    let service = ConciergeService::new(concierge.clone());

    // Choose transport: http (default, web routes plus MCP) or stdio (MCP only)
    let transport = std::env::var("CONCIERGE_TRANSPORT").unwrap_or_else(|_| "http".to_string());
    match transport.as_str() {
        "stdio" => {
            tracing::info!("main: Service created, starting server on stdio transport");
            let server = service.serve(stdio()).await?;
            tracing::info!("main: Server started, waiting for connection to close");
            server.waiting().await?;
            tracing::info!("main: Server connection closed");
            Ok(())
        }
        _ => {
            let bind: SocketAddr = concierge
                .config()
                .server
                .bind
                .parse()
                .with_context(|| {
                    format!(
                        "Invalid server bind {} (expected host:port)",
                        concierge.config().server.bind
                    )
                })?;
            let path = std::env::var("CONCIERGE_HTTP_PATH").unwrap_or_else(|_| "/mcp".to_string());

            let session_manager: rmcp::transport::streamable_http_server::session::local::LocalSessionManager = Default::default();
            let mcp_service: StreamableHttpService<ConciergeService, _> =
                StreamableHttpService::new(
                    move || Ok(service.clone()),
                    Arc::new(session_manager),
                    StreamableHttpServerConfig {
                        stateful_mode: true,
                        sse_keep_alive: Some(Duration::from_secs(15)),
                    },
                );

            let router = web::guarded(
                web::routes(concierge.clone()).nest_service(path.as_str(), mcp_service),
                concierge.config().server.bearer_token.clone(),
            );

            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!(
                %bind,
                path = %path,
                auth = %concierge.config().server.bearer_token.as_deref().map(|_| "bearer").unwrap_or("none"),
                generation = concierge.is_enabled(),
                "Starting concierge HTTP server"
            );

            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}
