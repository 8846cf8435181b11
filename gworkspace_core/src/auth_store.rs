use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::auth::AuthDetails;

/// Store keys searched, in order, for the default identity's tokens.
pub const DEFAULT_IDENTITY_KEYS: &[&str] = &["google-workspace", "google-common"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("persist error: {0}")]
    Persist(String),
}

pub trait AuthStore: Send + Sync {
    fn load(&self, provider: &str) -> Option<AuthDetails>;
    fn save(&self, provider: &str, auth: &AuthDetails) -> Result<(), StoreError>;

    /// First entry found under any of `providers`.
    fn load_first(&self, providers: &[&str]) -> Option<AuthDetails> {
        providers.iter().find_map(|p| self.load(p))
    }
}

/// In-memory store, mainly for tests.
pub struct MemoryAuthStore {
    map: std::sync::Mutex<HashMap<String, AuthDetails>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self {
            map: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore for MemoryAuthStore {
    fn load(&self, provider: &str) -> Option<AuthDetails> {
        self.map.lock().ok()?.get(provider).cloned()
    }
    fn save(&self, provider: &str, auth: &AuthDetails) -> Result<(), StoreError> {
        self.map
            .lock()
            .map_err(|e| StoreError::Persist(format!("lock poisoned: {}", e)))?
            .insert(provider.to_string(), auth.clone());
        Ok(())
    }
}

/// JSON file store at `~/.config/gworkspace/auth.json` (Unix)
/// or `%APPDATA%/gworkspace/auth.json` (Windows).
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new_default() -> Self {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::at(base.join("gworkspace").join("auth.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> HashMap<String, AuthDetails> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn write_map(&self, map: &HashMap<String, AuthDetails>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let s = serde_json::to_string_pretty(map)
            .map_err(|e| StoreError::Persist(format!("serde: {}", e)))?;
        std::fs::write(&self.path, &s).map_err(|e| StoreError::Persist(e.to_string()))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)
                .map_err(|e| StoreError::Persist(format!("chmod: {}", e)))?;
        }

        Ok(())
    }
}

impl AuthStore for FileAuthStore {
    fn load(&self, provider: &str) -> Option<AuthDetails> {
        self.read_map().get(provider).cloned()
    }

    fn save(&self, provider: &str, auth: &AuthDetails) -> Result<(), StoreError> {
        let mut map = self.read_map();
        map.insert(provider.to_string(), auth.clone());
        self.write_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(token: &str) -> AuthDetails {
        let mut d = AuthDetails::new();
        d.insert("access_token".to_string(), token.to_string());
        d
    }

    #[test]
    fn file_store_round_trips_and_restricts_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::at(dir.path().join("nested").join("auth.json"));
        assert!(store.load("google-workspace").is_none());

        store.save("google-workspace", &details("ya29.a")).unwrap();
        let loaded = store.load("google-workspace").unwrap();
        assert_eq!(loaded.get("access_token").map(String::as_str), Some("ya29.a"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn load_first_respects_order() {
        let store = MemoryAuthStore::new();
        store.save("google-common", &details("common")).unwrap();
        let found = store.load_first(DEFAULT_IDENTITY_KEYS).unwrap();
        assert_eq!(found["access_token"], "common");

        store.save("google-workspace", &details("workspace")).unwrap();
        let found = store.load_first(DEFAULT_IDENTITY_KEYS).unwrap();
        assert_eq!(found["access_token"], "workspace");
    }
}
