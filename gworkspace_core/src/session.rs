//! Per-identity cache of authenticated service clients.
//!
//! Two disjoint identity spaces live here. The default identity (single-tenant
//! mode) is built once at startup and never evicted. Keyed identities are
//! cached under `(Fingerprint, ServiceKind)` and built on first use.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::WorkspaceError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::services::{ClientFactory, ResolvedDependencies, ServiceClient, ServiceKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Keyed entries unused for this long are dropped by [`SessionManager::evict_expired`].
    pub idle_ttl: Option<Duration>,
    /// Upper bound on keyed entries; the least recently used entry goes first.
    pub max_entries: Option<usize>,
}

/// Partition key for client instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Default,
    Keyed(Fingerprint),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Default => f.write_str("default"),
            Identity::Keyed(fp) => write!(f, "key:{}", fp.short()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultState {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub builds: u64,
    pub evictions: u64,
    pub entries: usize,
}

struct CacheEntry {
    client: ServiceClient,
    last_used: Instant,
}

type CacheKey = (Fingerprint, ServiceKind);

pub struct SessionManager {
    factory: Arc<dyn ClientFactory>,
    multi_tenant: bool,
    enabled: Vec<ServiceKind>,
    policy: CachePolicy,
    keyed: Mutex<HashMap<CacheKey, CacheEntry>>,
    defaults: RwLock<HashMap<ServiceKind, ServiceClient>>,
    default_state: watch::Sender<DefaultState>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    evictions: AtomicU64,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        multi_tenant: bool,
        enabled: Vec<ServiceKind>,
        policy: CachePolicy,
    ) -> Self {
        let (default_state, _) = watch::channel(DefaultState::Pending);
        Self {
            factory,
            multi_tenant,
            enabled,
            policy,
            keyed: Mutex::new(HashMap::new()),
            defaults: RwLock::new(HashMap::new()),
            default_state,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn is_multi_tenant(&self) -> bool {
        self.multi_tenant
    }

    pub fn is_enabled(&self, kind: ServiceKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Resolve the client for `kind` on behalf of `credential`'s identity.
    ///
    /// A missing or blank credential selects the default identity, which
    /// only exists in single-tenant mode and is never built here.
    pub async fn get(
        &self,
        kind: ServiceKind,
        credential: Option<&str>,
    ) -> Result<ServiceClient, WorkspaceError> {
        if !self.is_enabled(kind) {
            return Err(WorkspaceError::ServiceDisabled(kind));
        }
        match credential.and_then(|c| fingerprint(c).map(|fp| (c, fp))) {
            Some((credential, fp)) => self.resolve_keyed(kind, credential, fp).await,
            None => self.get_default(kind).await,
        }
    }

    async fn get_default(&self, kind: ServiceKind) -> Result<ServiceClient, WorkspaceError> {
        if self.multi_tenant {
            return Err(WorkspaceError::MissingCredential);
        }
        self.wait_default().await?;
        self.defaults
            .read()
            .await
            .get(&kind)
            .cloned()
            .ok_or_else(|| WorkspaceError::Internal(format!("no default {} client registered", kind)))
    }

    // Boxed because dependency resolution recurses.
    fn resolve_keyed<'a>(
        &'a self,
        kind: ServiceKind,
        credential: &'a str,
        fp: Fingerprint,
    ) -> BoxFuture<'a, Result<ServiceClient, WorkspaceError>> {
        async move {
            let key = (fp, kind);
            if let Some(client) = self.lookup(&key).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %Identity::Keyed(key.0.clone()), service = %kind, "client cache hit");
                return Ok(client);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);

            let mut deps = ResolvedDependencies::default();
            for dep in kind.dependencies() {
                let client = self.resolve_keyed(*dep, credential, key.0.clone()).await?;
                deps.insert(&client);
            }

            // The cache lock is not held while building.
            self.builds.fetch_add(1, Ordering::Relaxed);
            let client = self.factory.build(kind, Some(credential), &deps).await?;
            info!(identity = %Identity::Keyed(key.0.clone()), service = %kind, "built client");
            self.insert(key, client.clone()).await;
            Ok(client)
        }
        .boxed()
    }

    async fn lookup(&self, key: &CacheKey) -> Option<ServiceClient> {
        let mut cache = self.keyed.lock().await;
        let entry = cache.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(entry.client.clone())
    }

    async fn insert(&self, key: CacheKey, client: ServiceClient) {
        let mut cache = self.keyed.lock().await;
        cache.insert(
            key,
            CacheEntry {
                client,
                last_used: Instant::now(),
            },
        );
        if let Some(max) = self.policy.max_entries {
            while cache.len() > max {
                let Some(oldest) = cache
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                cache.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(identity = %Identity::Keyed(oldest.0.clone()), service = %oldest.1, "evicted least recently used client");
            }
        }
    }

    /// Build every enabled service for the default identity and publish the
    /// outcome. No-op in multi-tenant mode.
    pub async fn initialize_default(&self) -> Result<(), WorkspaceError> {
        if self.multi_tenant {
            return Ok(());
        }
        match self.build_defaults().await {
            Ok(clients) => {
                let count = clients.len();
                *self.defaults.write().await = clients;
                self.default_state.send_replace(DefaultState::Ready);
                info!(clients = count, "default identity ready");
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    WorkspaceError::AuthInitialization(m) => m.clone(),
                    other => other.to_string(),
                };
                self.default_state.send_replace(DefaultState::Failed(message));
                Err(e)
            }
        }
    }

    async fn build_defaults(&self) -> Result<HashMap<ServiceKind, ServiceClient>, WorkspaceError> {
        let mut built: HashMap<ServiceKind, ServiceClient> = HashMap::new();
        for kind in build_order(&self.enabled) {
            let mut deps = ResolvedDependencies::default();
            for dep in kind.dependencies() {
                if let Some(client) = built.get(dep) {
                    deps.insert(client);
                }
            }
            self.builds.fetch_add(1, Ordering::Relaxed);
            let client = self.factory.build(kind, None, &deps).await?;
            debug!(identity = %Identity::Default, service = %kind, "built client");
            built.insert(kind, client);
        }
        Ok(built)
    }

    /// Run [`Self::initialize_default`] in the background.
    pub fn spawn_default_initialization(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.initialize_default().await {
                error!("default identity initialization failed: {}", e);
            }
        })
    }

    /// Wait until default initialization has finished.
    pub async fn wait_default(&self) -> Result<(), WorkspaceError> {
        let mut rx = self.default_state.subscribe();
        let state = rx
            .wait_for(|s| *s != DefaultState::Pending)
            .await
            .map_err(|_| WorkspaceError::Internal("default identity state channel closed".into()))?
            .clone();
        match state {
            DefaultState::Failed(message) => Err(WorkspaceError::AuthInitialization(format!(
                "default identity unavailable: {}",
                message
            ))),
            _ => Ok(()),
        }
    }

    pub fn default_state(&self) -> DefaultState {
        self.default_state.borrow().clone()
    }

    /// Drop keyed entries idle for longer than the policy's TTL.
    pub async fn evict_expired(&self) -> usize {
        let Some(ttl) = self.policy.idle_ttl else {
            return 0;
        };
        let mut cache = self.keyed.lock().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.last_used.elapsed() < ttl);
        let removed = before - cache.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = cache.len(), "evicted idle clients");
        }
        removed
    }

    /// Periodically evict idle entries. The task ends once the manager is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(this) = weak.upgrade() else {
                    break;
                };
                this.evict_expired().await;
            }
        })
    }

    pub async fn cached_len(&self) -> usize {
        self.keyed.lock().await.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.cached_len().await,
        }
    }
}

/// Enabled services with each service's dependencies ahead of it.
fn build_order(enabled: &[ServiceKind]) -> Vec<ServiceKind> {
    fn visit(kind: ServiceKind, out: &mut Vec<ServiceKind>) {
        if out.contains(&kind) {
            return;
        }
        for dep in kind.dependencies() {
            visit(*dep, out);
        }
        out.push(kind);
    }
    let mut out = Vec::new();
    for kind in enabled {
        visit(*kind, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFactory;

    fn manager(factory: Arc<StubFactory>, multi_tenant: bool, policy: CachePolicy) -> SessionManager {
        SessionManager::new(factory, multi_tenant, ServiceKind::ALL.to_vec(), policy)
    }

    #[test]
    fn dependencies_are_built_first() {
        assert_eq!(
            build_order(&[ServiceKind::Meet, ServiceKind::Gmail, ServiceKind::Calendar]),
            vec![ServiceKind::Calendar, ServiceKind::Meet, ServiceKind::Gmail]
        );
    }

    #[tokio::test]
    async fn same_credential_reuses_instance() {
        let factory = Arc::new(StubFactory::new());
        let sm = manager(factory.clone(), true, CachePolicy::default());
        let a = sm.get(ServiceKind::Calendar, Some("tok-A")).await.unwrap();
        let b = sm.get(ServiceKind::Calendar, Some("tok-A")).await.unwrap();
        assert!(a.same_instance(&b));
        assert_eq!(factory.builds(), 1);
        let stats = sm.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn distinct_credentials_are_isolated() {
        let factory = Arc::new(StubFactory::new());
        let sm = manager(factory.clone(), true, CachePolicy::default());
        let a = sm.get(ServiceKind::Drive, Some("tok-A")).await.unwrap();
        let b = sm.get(ServiceKind::Drive, Some("tok-B")).await.unwrap();
        assert!(!a.same_instance(&b));
        assert_eq!(factory.builds(), 2);
    }

    #[tokio::test]
    async fn default_identity_never_builds_on_lookup() {
        let factory = Arc::new(StubFactory::new());
        let sm = manager(factory.clone(), false, CachePolicy::default());
        sm.initialize_default().await.unwrap();
        let built = factory.builds();
        assert_eq!(built, ServiceKind::ALL.len());

        let a = sm.get(ServiceKind::Gmail, None).await.unwrap();
        let b = sm.get(ServiceKind::Gmail, Some("   ")).await.unwrap();
        assert!(a.same_instance(&b));
        assert_eq!(factory.builds(), built);
        assert_eq!(sm.cached_len().await, 0);
    }

    #[tokio::test]
    async fn default_and_keyed_spaces_are_disjoint() {
        let factory = Arc::new(StubFactory::new());
        let sm = manager(factory.clone(), false, CachePolicy::default());
        sm.initialize_default().await.unwrap();
        let default = sm.get(ServiceKind::Tasks, None).await.unwrap();
        let keyed = sm.get(ServiceKind::Tasks, Some("tok-A")).await.unwrap();
        assert!(!default.same_instance(&keyed));
        assert!(default.same_instance(&sm.get(ServiceKind::Tasks, None).await.unwrap()));
    }

    #[tokio::test]
    async fn multi_tenant_requires_credential() {
        let sm = manager(Arc::new(StubFactory::new()), true, CachePolicy::default());
        let err = sm.get(ServiceKind::Calendar, None).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::MissingCredential));
    }

    #[tokio::test]
    async fn failed_builds_are_not_cached() {
        let factory = Arc::new(StubFactory::new());
        factory.fail_for("bad");
        let sm = manager(factory.clone(), true, CachePolicy::default());
        assert!(sm.get(ServiceKind::Gmail, Some("bad")).await.is_err());
        assert!(sm.get(ServiceKind::Gmail, Some("bad")).await.is_err());
        assert_eq!(factory.builds(), 2);
        assert_eq!(sm.cached_len().await, 0);
    }

    #[tokio::test]
    async fn failed_default_initialization_fails_every_call() {
        let factory = Arc::new(StubFactory::new());
        factory.fail_default();
        let sm = manager(factory, false, CachePolicy::default());
        assert!(sm.initialize_default().await.is_err());
        assert!(matches!(sm.default_state(), DefaultState::Failed(_)));
        let err = sm.get(ServiceKind::Calendar, None).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AuthInitialization(_)));
    }

    #[tokio::test]
    async fn lookups_wait_for_pending_initialization() {
        let factory = Arc::new(StubFactory::new());
        let sm = Arc::new(manager(factory, false, CachePolicy::default()));
        let waiter = {
            let sm = sm.clone();
            tokio::spawn(async move { sm.get(ServiceKind::Calendar, None).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(sm.default_state(), DefaultState::Pending);
        sm.spawn_default_initialization().await.unwrap();
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn meet_reuses_cached_calendar() {
        let factory = Arc::new(StubFactory::new());
        let sm = manager(factory.clone(), true, CachePolicy::default());
        sm.get(ServiceKind::Calendar, Some("tok-A")).await.unwrap();
        sm.get(ServiceKind::Meet, Some("tok-A")).await.unwrap();
        assert_eq!(factory.builds_of(ServiceKind::Calendar), 1);
        assert_eq!(factory.builds_of(ServiceKind::Meet), 1);

        // Meet first for a new identity pulls Calendar into the cache too.
        sm.get(ServiceKind::Meet, Some("tok-B")).await.unwrap();
        sm.get(ServiceKind::Calendar, Some("tok-B")).await.unwrap();
        assert_eq!(factory.builds_of(ServiceKind::Calendar), 2);
        assert_eq!(sm.cached_len().await, 4);
    }

    #[tokio::test]
    async fn disabled_service_is_rejected() {
        let sm = SessionManager::new(
            Arc::new(StubFactory::new()),
            true,
            vec![ServiceKind::Calendar],
            CachePolicy::default(),
        );
        let err = sm.get(ServiceKind::Drive, Some("tok")).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::ServiceDisabled(ServiceKind::Drive)));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entries_expire() {
        let factory = Arc::new(StubFactory::new());
        let policy = CachePolicy {
            idle_ttl: Some(Duration::from_secs(60)),
            max_entries: None,
        };
        let sm = manager(factory.clone(), true, policy);
        sm.get(ServiceKind::Calendar, Some("old")).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        sm.get(ServiceKind::Calendar, Some("fresh")).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(sm.evict_expired().await, 1);
        assert_eq!(sm.cached_len().await, 1);
        sm.get(ServiceKind::Calendar, Some("old")).await.unwrap();
        assert_eq!(factory.builds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn least_recently_used_entry_is_evicted_at_capacity() {
        let factory = Arc::new(StubFactory::new());
        let policy = CachePolicy {
            idle_ttl: None,
            max_entries: Some(2),
        };
        let sm = manager(factory.clone(), true, policy);
        sm.get(ServiceKind::Gmail, Some("a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        sm.get(ServiceKind::Gmail, Some("b")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        sm.get(ServiceKind::Gmail, Some("a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        sm.get(ServiceKind::Gmail, Some("c")).await.unwrap();

        assert_eq!(sm.cached_len().await, 2);
        assert_eq!(sm.stats().await.evictions, 1);
        // "a" survived, "b" was evicted.
        sm.get(ServiceKind::Gmail, Some("a")).await.unwrap();
        assert_eq!(factory.builds(), 3);
        sm.get(ServiceKind::Gmail, Some("b")).await.unwrap();
        assert_eq!(factory.builds(), 4);
    }

    #[tokio::test]
    async fn concurrent_first_use_keeps_one_entry() {
        let factory = Arc::new(StubFactory::with_delay(Duration::from_millis(20)));
        let sm = Arc::new(manager(factory.clone(), true, CachePolicy::default()));
        let (a, b, other) = tokio::join!(
            sm.get(ServiceKind::Drive, Some("tok-X")),
            sm.get(ServiceKind::Drive, Some("tok-X")),
            sm.get(ServiceKind::Drive, Some("tok-Y")),
        );
        assert!(a.is_ok() && b.is_ok());
        let other = other.unwrap();
        // At most one build per racing caller of tok-X; tok-Y built exactly once.
        assert!(factory.builds_for(ServiceKind::Drive, Some("tok-X")) <= 2);
        assert_eq!(factory.builds_for(ServiceKind::Drive, Some("tok-Y")), 1);
        assert_eq!(sm.cached_len().await, 2);

        let survivor = sm.get(ServiceKind::Drive, Some("tok-X")).await.unwrap();
        assert!(!survivor.same_instance(&other));
        assert!(survivor.same_instance(&sm.get(ServiceKind::Drive, Some("tok-X")).await.unwrap()));
    }

    #[tokio::test]
    async fn cancelled_build_does_not_insert() {
        let factory = Arc::new(StubFactory::with_delay(Duration::from_secs(60)));
        let sm = manager(factory, true, CachePolicy::default());
        let res = tokio::time::timeout(
            Duration::from_millis(10),
            sm.get(ServiceKind::Calendar, Some("tok-A")),
        )
        .await;
        assert!(res.is_err());
        assert_eq!(sm.cached_len().await, 0);
    }
}
