use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::extract_credential;
use crate::dispatch::Dispatcher;
use crate::error::WorkspaceError;
use rmcp::model::*;

/// MCP server surface over the dispatcher: initialize, tool listing, tool calls.
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn get_capabilities(&self) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default();
        capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });
        capabilities
    }

    pub async fn handle_initialize(
        &self,
        _request: InitializeRequestParam,
    ) -> Result<InitializeResult, WorkspaceError> {
        info!(
            multi_tenant = self.dispatcher.sessions().is_multi_tenant(),
            tools = self.dispatcher.catalog().len(),
            "MCP Server initializing"
        );

        Ok(InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: self.get_capabilities(),
            server_info: Implementation {
                name: "gworkspace_mcp".to_string(),
                title: Some("Google Workspace".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some("Google Workspace tools for Calendar, Gmail, Drive, Tasks and Meet. In multi-tenant deployments every call must carry the caller's Google OAuth access token as a bearer credential.".to_string()),
        })
    }

    /// List tools, narrowed to `scopes` when given.
    pub fn handle_list_tools(&self, scopes: Option<&[&str]>) -> ListToolsResult {
        ListToolsResult {
            tools: self.dispatcher.catalog().list(scopes),
            next_cursor: None,
        }
    }

    /// Run a tool. `arguments` may be any JSON; non-objects come back as an
    /// error envelope.
    pub async fn handle_call_tool(
        &self,
        name: &str,
        arguments: Option<&Value>,
        credential: Option<&str>,
    ) -> CallToolResult {
        self.dispatcher.handle_value(name, arguments, credential).await
    }
}

/// Scope filter from `tools/list` params: `scopes` as a string or an array of strings.
fn scope_filter(params: &Value) -> Option<Vec<String>> {
    match params.get("scopes")? {
        Value::String(s) => Some(
            crate::tools::scopes::parse_scope_filter(s)
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

/// Credential carried in-band as `params._meta.authorization`.
fn meta_credential(params: &Value) -> Option<String> {
    let raw = params
        .pointer("/_meta/authorization")
        .or_else(|| params.pointer("/_meta/Authorization"))
        .and_then(|v| v.as_str());
    extract_credential(raw)
}

/// Maps JSON-RPC messages onto [`McpServer`].
pub struct JsonRpcHandler {
    server: Arc<McpServer>,
}

impl JsonRpcHandler {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Handle one raw message. Returns the serialized response, or `None`
    /// for notifications.
    pub async fn handle_message(&self, raw: &str, credential: Option<&str>) -> Option<String> {
        let response = match serde_json::from_str::<Value>(raw) {
            Ok(request) => self.handle_request(request, credential).await?,
            Err(e) => json!({
                "jsonrpc": "2.0",
                "error": WorkspaceError::SerdeJson(e).to_jsonrpc_error(),
                "id": Value::Null,
            }),
        };
        Some(response.to_string())
    }

    /// Handle one parsed request. `credential` comes from the transport
    /// (HTTP `Authorization` header) and takes precedence over `_meta`.
    pub async fn handle_request(&self, request: Value, credential: Option<&str>) -> Option<Value> {
        let id = request.get("id").cloned();
        let method = match request.get("method").and_then(|m| m.as_str()) {
            Some(m) => m.to_string(),
            None => {
                return Some(json!({
                    "jsonrpc": "2.0",
                    "error": {"code": -32600, "message": "Invalid Request"},
                    "id": id.unwrap_or(Value::Null),
                }))
            }
        };
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        let Some(id) = id else {
            debug!(method = %method, "notification");
            return None;
        };
        debug!(method = %method, "request");

        let result: Result<Value, Value> = match method.as_str() {
            "initialize" => match serde_json::from_value::<InitializeRequestParam>(params) {
                Ok(req) => self
                    .server
                    .handle_initialize(req)
                    .await
                    .and_then(|r| serde_json::to_value(r).map_err(WorkspaceError::SerdeJson))
                    .map_err(|e| e.to_jsonrpc_error()),
                Err(e) => Err(WorkspaceError::InvalidParams(e.to_string()).to_jsonrpc_error()),
            },
            "ping" => Ok(json!({})),
            "tools/list" => {
                let scopes = scope_filter(&params);
                let refs: Option<Vec<&str>> =
                    scopes.as_ref().map(|s| s.iter().map(String::as_str).collect());
                serde_json::to_value(self.server.handle_list_tools(refs.as_deref()))
                    .map_err(|e| WorkspaceError::SerdeJson(e).to_jsonrpc_error())
            }
            "tools/call" => {
                let in_band = meta_credential(&params);
                let credential = credential.map(str::to_string).or(in_band);
                match params.get("name").and_then(|n| n.as_str()) {
                    Some(name) => {
                        let result = self
                            .server
                            .handle_call_tool(name, params.get("arguments"), credential.as_deref())
                            .await;
                        serde_json::to_value(result)
                            .map_err(|e| WorkspaceError::SerdeJson(e).to_jsonrpc_error())
                    }
                    None => Err(WorkspaceError::InvalidParams(
                        "tools/call requires a string 'name'".to_string(),
                    )
                    .to_jsonrpc_error()),
                }
            }
            _ => Err(WorkspaceError::MethodNotFound.to_jsonrpc_error()),
        };

        Some(match result {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "result": result,
                "id": id,
            }),
            Err(error) => json!({
                "jsonrpc": "2.0",
                "error": error,
                "id": id,
            }),
        })
    }
}
