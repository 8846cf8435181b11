use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{CalendarApi, ServiceClient, ServiceKind};
use crate::auth::{Authenticator, GoogleAuthenticator};
use crate::auth_store::AuthStore;
use crate::config::GoogleConfig;
use crate::error::WorkspaceError;
use crate::google::hub::{new_https_client, HttpsClient};
use crate::google::{self, GoogleRest};

/// Clients already resolved for the same identity, handed to builds of
/// services that declare them in [`ServiceKind::dependencies`].
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    pub calendar: Option<Arc<dyn CalendarApi>>,
}

impl ResolvedDependencies {
    pub fn insert(&mut self, client: &ServiceClient) {
        if let ServiceClient::Calendar(c) = client {
            self.calendar = Some(c.clone());
        }
    }

    pub fn require_calendar(&self) -> Result<Arc<dyn CalendarApi>, WorkspaceError> {
        self.calendar
            .clone()
            .ok_or_else(|| WorkspaceError::Internal("calendar dependency was not resolved".into()))
    }
}

#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build an authenticated client for `kind`. `credential` is the caller's
    /// raw token, `None` meaning the default identity.
    async fn build(
        &self,
        kind: ServiceKind,
        credential: Option<&str>,
        deps: &ResolvedDependencies,
    ) -> Result<ServiceClient, WorkspaceError>;
}

/// Builds clients against the live Google APIs: API hubs over a shared hyper
/// pool, plus reqwest for Meet.
pub struct GoogleClientFactory {
    authenticator: Arc<dyn Authenticator>,
    http: reqwest::Client,
    hub_client: HttpsClient,
}

impl GoogleClientFactory {
    pub fn new(authenticator: Arc<dyn Authenticator>, http: reqwest::Client) -> Self {
        Self {
            authenticator,
            http,
            hub_client: new_https_client(),
        }
    }

    /// Factory with a shared HTTP client and a [`GoogleAuthenticator`] over `store`.
    pub fn from_config(
        config: &GoogleConfig,
        store: Arc<dyn AuthStore>,
    ) -> Result<Self, WorkspaceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("gworkspace-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let authenticator = GoogleAuthenticator::new(http.clone(), config.clone(), store);
        Ok(Self::new(Arc::new(authenticator), http))
    }
}

#[async_trait]
impl ClientFactory for GoogleClientFactory {
    async fn build(
        &self,
        kind: ServiceKind,
        credential: Option<&str>,
        deps: &ResolvedDependencies,
    ) -> Result<ServiceClient, WorkspaceError> {
        let handle = self.authenticator.authenticate(credential).await?;
        debug!(service = %kind, scopes = handle.scopes.len(), "building google client");
        let pool = self.hub_client.clone();
        let token = handle.access_token();
        let client = match kind {
            ServiceKind::Calendar => {
                ServiceClient::Calendar(Arc::new(google::GoogleCalendar::new(pool, token)))
            }
            ServiceKind::Gmail => ServiceClient::Gmail(Arc::new(google::GoogleGmail::new(pool, token))),
            ServiceKind::Drive => ServiceClient::Drive(Arc::new(google::GoogleDrive::new(pool, token))),
            ServiceKind::Tasks => ServiceClient::Tasks(Arc::new(google::GoogleTasks::new(pool, token))),
            ServiceKind::Meet => ServiceClient::Meet(Arc::new(google::GoogleMeet::new(
                GoogleRest::new(self.http.clone(), &handle, google::MEET_BASE),
                deps.require_calendar()?,
            ))),
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_store::MemoryAuthStore;

    #[tokio::test]
    async fn meet_build_requires_calendar_dependency() {
        let config = GoogleConfig::default();
        let factory =
            GoogleClientFactory::from_config(&config, Arc::new(MemoryAuthStore::new())).unwrap();
        let err = factory
            .build(ServiceKind::Meet, Some("tok"), &ResolvedDependencies::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Internal(_)));
    }

    #[tokio::test]
    async fn builds_each_kind_for_a_caller_credential() {
        let factory = GoogleClientFactory::from_config(
            &GoogleConfig::default(),
            Arc::new(MemoryAuthStore::new()),
        )
        .unwrap();
        let mut deps = ResolvedDependencies::default();
        for kind in ServiceKind::ALL {
            let client = factory.build(kind, Some("tok"), &deps).await.unwrap();
            assert_eq!(client.kind(), kind);
            deps.insert(&client);
        }
    }
}
