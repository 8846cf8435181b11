use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenInfo {
    pub scope: Option<String>,
    pub expires_in: Option<i64>,
    pub email: Option<String>,
}

impl TokenInfo {
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }
}

fn error_detail(v: &serde_json::Value) -> String {
    v.get("error_description")
        .or_else(|| v.get("error"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| v.to_string())
}

pub async fn google_refresh_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> Result<OAuthTokens, WorkspaceError> {
    let mut body = vec![
        ("grant_type", "refresh_token".to_string()),
        ("client_id", client_id.to_string()),
        ("refresh_token", refresh_token.to_string()),
    ];
    if let Some(cs) = client_secret {
        if !cs.is_empty() {
            body.push(("client_secret", cs.to_string()));
        }
    }
    let resp = http
        .post(GOOGLE_TOKEN_URL)
        .form(&body)
        .send()
        .await
        .map_err(|e| WorkspaceError::AuthInitialization(format!("token endpoint: {}", e)))?;
    let status = resp.status();
    let v = resp
        .json::<serde_json::Value>()
        .await
        .map_err(|e| WorkspaceError::AuthInitialization(e.to_string()))?;
    if !status.is_success() {
        return Err(WorkspaceError::AuthInitialization(format!(
            "refresh failed: {}",
            error_detail(&v)
        )));
    }
    let access_token = v["access_token"].as_str().unwrap_or_default().to_string();
    if access_token.is_empty() {
        return Err(WorkspaceError::AuthInitialization(
            "refresh response carried no access_token".to_string(),
        ));
    }
    Ok(OAuthTokens {
        access_token,
        refresh_token: v
            .get("refresh_token")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string()),
        expires_in: v.get("expires_in").and_then(|i| i.as_i64()),
        scope: v
            .get("scope")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string()),
        token_type: v
            .get("token_type")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string()),
    })
}

/// Ask Google whether an access token is live and which scopes it carries.
pub async fn google_token_info(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<TokenInfo, WorkspaceError> {
    let resp = http
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("access_token", access_token)])
        .send()
        .await
        .map_err(|e| WorkspaceError::AuthInitialization(format!("tokeninfo: {}", e)))?;
    let status = resp.status();
    let v = resp
        .json::<serde_json::Value>()
        .await
        .map_err(|e| WorkspaceError::AuthInitialization(e.to_string()))?;
    if !status.is_success() {
        return Err(WorkspaceError::AuthInitialization(format!(
            "credential rejected: {}",
            error_detail(&v)
        )));
    }
    Ok(TokenInfo {
        scope: v.get("scope").and_then(|s| s.as_str()).map(|s| s.to_string()),
        expires_in: v.get("expires_in").and_then(|i| match i {
            serde_json::Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        }),
        email: v.get("email").and_then(|s| s.as_str()).map(|s| s.to_string()),
    })
}
