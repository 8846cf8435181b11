//! Streamable-HTTP style transport: `POST /mcp` carries one JSON-RPC message,
//! the `Authorization` header carries the caller's Google access token.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::auth::extract_credential;
use crate::error::WorkspaceError;
use crate::mcp_server::JsonRpcHandler;

pub fn router(handler: Arc<JsonRpcHandler>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/health", get(health))
        .with_state(handler)
}

pub async fn serve(bind: &str, handler: Arc<JsonRpcHandler>) -> Result<(), WorkspaceError> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| WorkspaceError::Config(format!("invalid bind address '{}'", bind)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Starting HTTP transport");
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down HTTP transport");
            }
        })
        .await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_mcp(
    State(handler): State<Arc<JsonRpcHandler>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let credential = extract_credential(header);

    let request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let error = json!({
                "jsonrpc": "2.0",
                "error": WorkspaceError::SerdeJson(e).to_jsonrpc_error(),
                "id": Value::Null,
            });
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    };

    match handler.handle_request(request, credential.as_deref()).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::fingerprint::fingerprint;
    use crate::mcp_server::McpServer;
    use crate::services::ServiceKind;
    use crate::session::{CachePolicy, SessionManager};
    use crate::testing::StubFactory;
    use crate::tools::ToolCatalog;

    async fn spawn() -> (String, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory::new());
        let sessions = Arc::new(SessionManager::new(
            factory.clone(),
            true,
            ServiceKind::ALL.to_vec(),
            CachePolicy::default(),
        ));
        let catalog = Arc::new(ToolCatalog::new(&ServiceKind::ALL));
        let server = Arc::new(McpServer::new(Arc::new(Dispatcher::new(sessions, catalog))));
        let app = router(Arc::new(JsonRpcHandler::new(server)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), factory)
    }

    #[tokio::test]
    async fn authorization_header_selects_identity() {
        let (base, factory) = spawn().await;
        let client = reqwest::Client::new();
        let body = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "google_tasks_list_task_lists", "arguments": {}},
        });

        let response: Value = client
            .post(format!("{}/mcp", base))
            .header("Authorization", "Bearer tok-http")
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"]["isError"], false);
        assert_eq!(factory.log().calls()[0].identity, fingerprint("tok-http"));

        let response: Value = client
            .post(format!("{}/mcp", base))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["result"]["isError"], true);
    }

    #[tokio::test]
    async fn empty_bearer_header_is_no_credential() {
        let (base, factory) = spawn().await;
        let response: Value = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .header("Authorization", "Bearer ")
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "tools/call",
                "params": {"name": "google_tasks_list_task_lists", "arguments": {}},
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(
            response["result"]["content"][0]["text"],
            "Error: A bearer credential is required in multi-tenant mode"
        );
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn notifications_are_accepted_without_body() {
        let (base, _) = spawn().await;
        let status = reqwest::Client::new()
            .post(format!("{}/mcp", base))
            .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status.as_u16(), 202);

        let health: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }
}
