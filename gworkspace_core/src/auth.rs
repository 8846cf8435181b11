//! Credential parsing and the authentication exchange behind client builds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth_store::{AuthStore, DEFAULT_IDENTITY_KEYS};
use crate::config::GoogleConfig;
use crate::error::WorkspaceError;
use crate::oauth;

/// Flat key/value credential record as kept in an [`AuthStore`].
pub type AuthDetails = HashMap<String, String>;

/// Parse an `Authorization` header value into a raw credential.
///
/// Accepts `Bearer <token>` (scheme is case-insensitive) or a bare token.
/// Other schemes and empty values yield `None`.
pub fn extract_credential(header: Option<&str>) -> Option<String> {
    let value = header?.trim();
    if value.is_empty() {
        return None;
    }
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = rest.trim();
            (!token.is_empty()).then(|| token.to_string())
        }
        Some(_) => None,
        // A lone scheme keyword carries no token.
        None if value.eq_ignore_ascii_case("bearer") => None,
        None => Some(value.to_string()),
    }
}

/// Outcome of a successful authentication exchange.
#[derive(Clone)]
pub struct AuthenticatedHandle {
    access_token: String,
    pub scopes: Vec<String>,
    pub email: Option<String>,
}

impl AuthenticatedHandle {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            scopes: Vec::new(),
            email: None,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AuthenticatedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedHandle")
            .field("access_token", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("email", &self.email)
            .finish()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange a caller credential (or, when `None`, the process-wide
    /// default credentials) for a usable handle.
    async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedHandle, WorkspaceError>;
}

pub struct GoogleAuthenticator {
    http: reqwest::Client,
    config: GoogleConfig,
    store: Arc<dyn AuthStore>,
}

impl GoogleAuthenticator {
    pub fn new(http: reqwest::Client, config: GoogleConfig, store: Arc<dyn AuthStore>) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    async fn authenticate_default(&self) -> Result<AuthenticatedHandle, WorkspaceError> {
        if let Some(token) = self.config.access_token.as_deref() {
            debug!("default identity: using configured access token");
            return Ok(AuthenticatedHandle::new(token));
        }

        let stored = self.store.load_first(DEFAULT_IDENTITY_KEYS).unwrap_or_default();
        let refresh_token = self
            .config
            .refresh_token
            .clone()
            .or_else(|| stored.get("refresh_token").cloned());
        let client_id = self
            .config
            .client_id
            .clone()
            .or_else(|| stored.get("client_id").cloned());
        let client_secret = self
            .config
            .client_secret
            .clone()
            .or_else(|| stored.get("client_secret").cloned());

        if let (Some(refresh), Some(client_id)) = (refresh_token, client_id) {
            match oauth::google_refresh_token(
                &self.http,
                &client_id,
                client_secret.as_deref(),
                &refresh,
            )
            .await
            {
                Ok(tokens) => {
                    info!("default identity: refreshed access token");
                    let mut handle = AuthenticatedHandle::new(tokens.access_token);
                    handle.scopes = tokens
                        .scope
                        .map(|s| s.split_whitespace().map(str::to_string).collect())
                        .unwrap_or_default();
                    return Ok(handle);
                }
                Err(e) if stored.contains_key("access_token") => {
                    warn!("default identity: refresh failed ({}), using stored token", e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(token) = stored.get("access_token") {
            debug!("default identity: using stored access token");
            return Ok(AuthenticatedHandle::new(token.clone()));
        }

        Err(WorkspaceError::AuthInitialization(
            "no default Google credentials: set GOOGLE_ACCESS_TOKEN, or GOOGLE_REFRESH_TOKEN with GOOGLE_CLIENT_ID, or store tokens under 'google-workspace'".to_string(),
        ))
    }
}

#[async_trait]
impl Authenticator for GoogleAuthenticator {
    async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedHandle, WorkspaceError> {
        let Some(credential) = credential else {
            return self.authenticate_default().await;
        };
        let mut handle = AuthenticatedHandle::new(credential);
        if self.config.validate_tokens {
            let info = oauth::google_token_info(&self.http, credential).await?;
            handle.scopes = info.scopes();
            handle.email = info.email;
        }
        Ok(handle)
    }
}
