//! Tool-call dispatch: validate, resolve a client, execute, wrap.
//!
//! [`Dispatcher::handle`] never fails. Every outcome, including unknown tools
//! and upstream errors, comes back as a response envelope so the protocol
//! channel stays open.

use rmcp::model::{CallToolResult, JsonObject};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, field, info_span, warn, Instrument, Span};

use crate::error::WorkspaceError;
use crate::fingerprint::fingerprint;
use crate::services::ToolOutput;
use crate::session::SessionManager;
use crate::tools::{ToolCatalog, ToolInvocation};
use crate::utils::envelope;

pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    catalog: Arc<ToolCatalog>,
}

impl Dispatcher {
    pub fn new(sessions: Arc<SessionManager>, catalog: Arc<ToolCatalog>) -> Self {
        Self { sessions, catalog }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn handle(
        &self,
        name: &str,
        args: &JsonObject,
        credential: Option<&str>,
    ) -> CallToolResult {
        self.call(name, Ok(args), credential).await
    }

    /// [`Self::handle`] for an argument bag of any JSON shape. Absent or null
    /// arguments are an empty object; anything else but an object is rejected.
    pub async fn handle_value(
        &self,
        name: &str,
        args: Option<&Value>,
        credential: Option<&str>,
    ) -> CallToolResult {
        let empty = JsonObject::new();
        let args = match args {
            None | Some(Value::Null) => Ok(&empty),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(json_type(other)),
        };
        self.call(name, args, credential).await
    }

    async fn call(
        &self,
        name: &str,
        args: Result<&JsonObject, &'static str>,
        credential: Option<&str>,
    ) -> CallToolResult {
        let identity = credential
            .and_then(fingerprint)
            .map(|fp| fp.short().to_string())
            .unwrap_or_else(|| "default".to_string());
        let span = info_span!(
            "tool_call",
            tool = name,
            service = field::Empty,
            identity = %identity
        );
        let outcome = self.run(name, args, credential).instrument(span).await;
        if let Err(e) = &outcome {
            warn!(tool = name, kind = e.code_str(), "tool call failed: {}", e);
        }
        envelope(outcome)
    }

    async fn run(
        &self,
        name: &str,
        args: Result<&JsonObject, &'static str>,
        credential: Option<&str>,
    ) -> Result<ToolOutput, WorkspaceError> {
        let tool = self
            .catalog
            .find(name)
            .ok_or_else(|| WorkspaceError::UnknownTool(name.to_string()))?;
        Span::current().record("service", tool.service().as_str());

        let args = args.map_err(|got| {
            WorkspaceError::Validation(vec![format!("arguments must be an object (got {})", got)])
        })?;
        let invocation = ToolInvocation::for_tool(tool, args)?;
        debug!("arguments valid");

        let client = self.sessions.get(tool.service(), credential).await?;
        debug!("client resolved");

        invocation.execute(&client).await
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
