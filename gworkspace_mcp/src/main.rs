use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gworkspace_core::{
    auth_store::FileAuthStore,
    http,
    mcp_server::{JsonRpcHandler, McpServer},
    transport::StdioTransport,
    Dispatcher, GoogleClientFactory, ServerConfig, SessionManager, ToolCatalog, TransportKind,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load()?;
    info!(
        multi_tenant = config.multi_tenant,
        transport = ?config.transport,
        services = ?config.services,
        "Starting Google Workspace MCP Server"
    );

    let store = Arc::new(FileAuthStore::new_default());
    let factory = Arc::new(GoogleClientFactory::from_config(&config.google, store)?);
    let sessions = Arc::new(SessionManager::new(
        factory,
        config.multi_tenant,
        config.services.clone(),
        config.cache.policy(),
    ));

    if !config.multi_tenant {
        if config.fail_fast_on_startup_auth {
            if let Err(e) = sessions.initialize_default().await {
                error!("default identity failed to authenticate: {}", e);
                return Err(e.into());
            }
        } else {
            sessions.spawn_default_initialization();
        }
    } else if config.transport == TransportKind::Stdio {
        warn!("multi-tenant mode over stdio: callers must pass credentials in _meta.authorization");
    }
    sessions.spawn_sweeper(config.cache.sweep_interval());

    let catalog = Arc::new(ToolCatalog::new(&config.services));
    let server = Arc::new(McpServer::new(Arc::new(Dispatcher::new(sessions, catalog))));
    let handler = Arc::new(JsonRpcHandler::new(server));

    match config.transport {
        TransportKind::Stdio => {
            info!("MCP Server ready, listening on stdio");
            if let Err(e) = StdioTransport::new(handler).run().await {
                error!("Transport error: {}", e);
                return Err(e.into());
            }
        }
        TransportKind::Http => {
            info!(bind = %config.http_bind, "MCP Server ready, listening on http");
            if let Err(e) = http::serve(&config.http_bind, handler).await {
                error!("Transport error: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
