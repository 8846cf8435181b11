//! Google Workspace API clients.
//!
//! Calendar, Gmail, Drive and Tasks go through the generated hubs (see [`hub`]),
//! each bound to one access token. Meet REST v2 goes through [`GoogleRest`].
//! Failed calls become [`WorkspaceError::Upstream`] carrying Google's own error
//! message.

pub mod calendar;
pub mod drive;
pub mod gmail;
pub mod hub;
pub mod meet;
pub mod tasks;

use serde_json::Value;
use tracing::debug;

use crate::auth::AuthenticatedHandle;
use crate::error::WorkspaceError;

pub use calendar::GoogleCalendar;
pub use drive::GoogleDrive;
pub use gmail::GoogleGmail;
pub use meet::GoogleMeet;
pub use tasks::GoogleTasks;

pub const MEET_BASE: &str = "https://meet.googleapis.com/v2";

pub type Query = Vec<(&'static str, String)>;

#[derive(Clone)]
pub struct GoogleRest {
    http: reqwest::Client,
    token: String,
    base: String,
}

impl GoogleRest {
    pub fn new(http: reqwest::Client, handle: &AuthenticatedHandle, base: impl Into<String>) -> Self {
        Self {
            http,
            token: handle.access_token().to_string(),
            base: base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, WorkspaceError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "google api error body: {}", body);
        Err(WorkspaceError::Upstream(upstream_message(status, &body)))
    }

    async fn json(resp: reqwest::Response) -> Result<Value, WorkspaceError> {
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get(&self, path: &str, query: &Query) -> Result<Value, WorkspaceError> {
        let resp = self.send(self.http.get(self.url(path)).query(query)).await?;
        Self::json(resp).await
    }

    pub async fn post(&self, path: &str, query: &Query, body: &Value) -> Result<Value, WorkspaceError> {
        let resp = self
            .send(self.http.post(self.url(path)).query(query).json(body))
            .await?;
        Self::json(resp).await
    }
}

/// Message for a failed Google API call: the `error.message` field of the
/// standard error body when present, otherwise the status and raw body.
pub fn upstream_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| error_message(&v));
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => format!("HTTP {}: {}", status, body.trim()),
    }
}

/// `error.message` of a standard Google error body, or the OAuth-style fields.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("error_description"))
        .or_else(|| body.get("error").filter(|e| e.is_string()))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}

pub(crate) fn str_field(v: &Value, pointer: &str) -> Option<String> {
    v.pointer(pointer).and_then(|s| s.as_str()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn upstream_message_passes_google_error_through() {
        let body = r#"{"error":{"code":404,"message":"Not Found","status":"NOT_FOUND"}}"#;
        assert_eq!(upstream_message(StatusCode::NOT_FOUND, body), "Not Found");
        assert_eq!(
            upstream_message(StatusCode::FORBIDDEN, "quota exceeded"),
            "HTTP 403 Forbidden: quota exceeded"
        );
        assert_eq!(upstream_message(StatusCode::BAD_GATEWAY, ""), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn url_joins_and_passes_absolute() {
        let rest = GoogleRest::new(
            reqwest::Client::new(),
            &AuthenticatedHandle::new("t"),
            "https://example.test/v1/",
        );
        assert_eq!(rest.url("/a/b"), "https://example.test/v1/a/b");
        assert_eq!(rest.url("https://other.test/x"), "https://other.test/x");
    }
}
