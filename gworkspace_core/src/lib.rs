// src/lib.rs
pub mod auth;
pub mod auth_store;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod google;
pub mod http;
pub mod mcp_server;
pub mod oauth;
pub mod services;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod tools;
pub mod transport;
pub mod utils;

// Re-export types from rmcp that users of the library need
pub use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, InitializeRequestParam,
    InitializeResult, JsonObject, ListToolsResult, ProtocolVersion, ServerCapabilities, Tool,
};

pub use crate::config::{ServerConfig, TransportKind};
pub use crate::dispatch::Dispatcher;
pub use crate::error::WorkspaceError;
pub use crate::fingerprint::{fingerprint, Fingerprint};
pub use crate::services::{ClientFactory, GoogleClientFactory, ServiceClient, ServiceKind};
pub use crate::session::{CachePolicy, CacheStats, SessionManager};
pub use crate::tools::{ToolCatalog, ToolId};
