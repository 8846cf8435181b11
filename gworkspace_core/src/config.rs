//! Server configuration.
//!
//! Values come from an optional TOML file (path in `GWORKSPACE_CONFIG`) and
//! are then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WorkspaceError;
use crate::services::ServiceKind;
use crate::session::CachePolicy;

pub const CONFIG_PATH_ENV: &str = "GWORKSPACE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportKind {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => Err(WorkspaceError::Config(format!(
                "unknown transport '{}' (expected stdio or http)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Every caller must present its own bearer credential; no default identity.
    pub multi_tenant: bool,
    pub transport: TransportKind,
    pub http_bind: String,
    /// Services whose tools are exposed.
    pub services: Vec<ServiceKind>,
    /// Exit at startup when the default identity cannot authenticate
    /// (single-tenant only). Otherwise every call reports the failure.
    pub fail_fast_on_startup_auth: bool,
    pub cache: CacheConfig,
    pub google: GoogleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            multi_tenant: false,
            transport: TransportKind::Stdio,
            http_bind: "127.0.0.1:8808".to_string(),
            services: ServiceKind::ALL.to_vec(),
            fail_fast_on_startup_auth: false,
            cache: CacheConfig::default(),
            google: GoogleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Idle seconds after which a credentialed client is dropped (0 disables).
    pub idle_ttl_secs: u64,
    /// Upper bound on cached credentialed clients (0 disables).
    pub max_entries: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 3600,
            max_entries: 1024,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            idle_ttl: (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs)),
            max_entries: (self.max_entries > 0).then_some(self.max_entries),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Static access token for the default identity.
    pub access_token: Option<String>,
    /// Refresh token for the default identity.
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Check caller credentials against Google's tokeninfo endpoint before
    /// building clients for them.
    pub validate_tokens: bool,
    pub request_timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            validate_tokens: false,
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("GoogleConfig")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("validate_tokens", &self.validate_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GoogleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl ServerConfig {
    /// Load from `GWORKSPACE_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, WorkspaceError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, WorkspaceError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WorkspaceError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, WorkspaceError> {
        toml::from_str(text).map_err(|e| WorkspaceError::Config(e.to_string()))
    }

    /// Apply `GWORKSPACE_*` / `GOOGLE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), WorkspaceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GWORKSPACE_MULTI_TENANT") {
            self.multi_tenant = parse_bool("GWORKSPACE_MULTI_TENANT", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_TRANSPORT") {
            self.transport = v.parse()?;
        }
        if let Some(v) = get("GWORKSPACE_HTTP_BIND") {
            self.http_bind = v.trim().to_string();
        }
        if let Some(v) = get("GWORKSPACE_SERVICES") {
            self.services = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(v) = get("GWORKSPACE_FAIL_FAST_ON_STARTUP_AUTH") {
            self.fail_fast_on_startup_auth =
                parse_bool("GWORKSPACE_FAIL_FAST_ON_STARTUP_AUTH", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_CACHE_IDLE_TTL_SECS") {
            self.cache.idle_ttl_secs = parse_num("GWORKSPACE_CACHE_IDLE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = parse_num("GWORKSPACE_CACHE_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_CACHE_SWEEP_SECS") {
            self.cache.sweep_interval_secs = parse_num("GWORKSPACE_CACHE_SWEEP_SECS", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_VALIDATE_TOKENS") {
            self.google.validate_tokens = parse_bool("GWORKSPACE_VALIDATE_TOKENS", &v)?;
        }
        if let Some(v) = get("GWORKSPACE_REQUEST_TIMEOUT_SECS") {
            self.google.request_timeout_secs =
                parse_num("GWORKSPACE_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.google.access_token = Some(v);
        }
        if let Some(v) = get("GOOGLE_REFRESH_TOKEN") {
            self.google.refresh_token = Some(v);
        }
        if let Some(v) = get("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), WorkspaceError> {
        if self.services.is_empty() {
            return Err(WorkspaceError::Config(
                "at least one service must be enabled".to_string(),
            ));
        }
        for service in &self.services {
            for dep in service.dependencies() {
                if !self.services.contains(dep) {
                    return Err(WorkspaceError::Config(format!(
                        "service '{}' requires '{}' to be enabled",
                        service, dep
                    )));
                }
            }
        }
        if self.transport == TransportKind::Http {
            self.http_bind
                .parse::<std::net::SocketAddr>()
                .map_err(|e| {
                    WorkspaceError::Config(format!("invalid http_bind '{}': {}", self.http_bind, e))
                })?;
        }
        Ok(())
    }

    pub fn is_enabled(&self, service: ServiceKind) -> bool {
        self.services.contains(&service)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, WorkspaceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(WorkspaceError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, WorkspaceError> {
    value.trim().parse().map_err(|_| {
        WorkspaceError::Config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_single_tenant_stdio() {
        let config = ServerConfig::default();
        assert!(!config.multi_tenant);
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.services.len(), 5);
        config.validate().unwrap();
    }

    #[test]
    fn toml_then_env_overrides() {
        let mut config = ServerConfig::from_toml(
            r#"
            multi_tenant = false
            services = ["calendar", "gmail"]

            [cache]
            idle_ttl_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.services, vec![ServiceKind::Calendar, ServiceKind::Gmail]);
        assert_eq!(config.cache.idle_ttl_secs, 10);
        assert_eq!(config.cache.max_entries, 1024);

        config
            .apply_overrides(env(&[
                ("GWORKSPACE_MULTI_TENANT", "true"),
                ("GWORKSPACE_SERVICES", "calendar, meet"),
                ("GWORKSPACE_CACHE_MAX_ENTRIES", "0"),
                ("GOOGLE_ACCESS_TOKEN", "ya29.default"),
            ]))
            .unwrap();
        assert!(config.multi_tenant);
        assert_eq!(config.services, vec![ServiceKind::Calendar, ServiceKind::Meet]);
        assert_eq!(config.cache.policy().max_entries, None);
        assert_eq!(config.google.access_token.as_deref(), Some("ya29.default"));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ServerConfig::default();
        assert!(config
            .apply_overrides(env(&[("GWORKSPACE_MULTI_TENANT", "maybe")]))
            .is_err());
        assert!(config
            .apply_overrides(env(&[("GWORKSPACE_SERVICES", "calendar,sheets")]))
            .is_err());
    }

    #[test]
    fn meet_requires_calendar() {
        let config = ServerConfig {
            services: vec![ServiceKind::Meet],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = ServerConfig::default();
        config.google.access_token = Some("ya29.secret".to_string());
        let shown = format!("{:?}", config);
        assert!(!shown.contains("ya29.secret"));
    }
}
