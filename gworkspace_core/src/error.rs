// src/error.rs
use serde_json::json;

use crate::services::ServiceKind;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Invalid arguments: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Authentication failed: {0}")]
    AuthInitialization(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Upstream(String),

    #[error("A bearer credential is required in multi-tenant mode")]
    MissingCredential,

    #[error("Service '{0}' is not enabled on this server")]
    ServiceDisabled(ServiceKind),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found")]
    MethodNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkspaceError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkspaceError::Validation(vec![message.into()])
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            WorkspaceError::Validation(_) => "invalid_arguments",
            WorkspaceError::InvalidParams(_) => "invalid_params",
            WorkspaceError::AuthInitialization(_) => "auth_failed",
            WorkspaceError::MissingCredential => "missing_credential",
            WorkspaceError::UnknownTool(_) => "tool_not_found",
            WorkspaceError::ServiceDisabled(_) => "service_disabled",
            WorkspaceError::MethodNotFound => "method_not_found",
            WorkspaceError::Upstream(_) | WorkspaceError::HttpRequest(_) => "upstream_error",
            WorkspaceError::Config(_) => "config_error",
            WorkspaceError::SerdeJson(_) => "parse_error",
            WorkspaceError::Io(_) | WorkspaceError::Internal(_) => "internal_error",
        }
    }

    pub fn to_jsonrpc_error(&self) -> serde_json::Value {
        let (code, message) = match self {
            WorkspaceError::UnknownTool(name) => (-32602, format!("Unknown tool: {}", name)),
            WorkspaceError::InvalidParams(msg) => (-32602, msg.to_string()),
            WorkspaceError::Validation(_) => (-32602, self.to_string()),
            WorkspaceError::MethodNotFound => (-32601, "Method not found".to_string()),
            WorkspaceError::SerdeJson(e) => (-32700, format!("Parse error: {}", e)),
            err => (-32603, err.to_string()),
        };

        json!({
            "code": code,
            "message": message,
            "data": { "kind": self.code_str() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_violations() {
        let err = WorkspaceError::Validation(vec![
            "missing required field 'summary'".to_string(),
            "missing required field 'start'".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid arguments: missing required field 'summary'; missing required field 'start'"
        );
        assert_eq!(err.code_str(), "invalid_arguments");
    }

    #[test]
    fn jsonrpc_codes() {
        assert_eq!(
            WorkspaceError::MethodNotFound.to_jsonrpc_error()["code"],
            -32601
        );
        assert_eq!(
            WorkspaceError::UnknownTool("x".into()).to_jsonrpc_error()["message"],
            "Unknown tool: x"
        );
        assert_eq!(
            WorkspaceError::Upstream("quota".into()).to_jsonrpc_error()["code"],
            -32603
        );
    }
}
