//! Session persistence.
//!
//! The [`SessionStore`] is the only owner of the access token, refresh token
//! and cached user. Callers never touch the storage keys directly: they go
//! through [`SessionStore::init`], [`SessionStore::start`],
//! [`SessionStore::renew_access_token`] and [`SessionStore::clear`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage key for the access token.
const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token.
const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the cached user, stored as a JSON string.
const USER_KEY: &str = "user";

/// Default session file name within the campus config directory.
pub const SESSION_FILE: &str = "session.json";

/// Identity of the signed-in user, cached alongside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User ID.
    pub id: String,
    /// Login email.
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Role name (e.g. "admin", "teacher", "parent").
    #[serde(default)]
    pub role: Option<String>,
    /// Tenant the user belongs to. Platform administrators have none.
    #[serde(default)]
    pub school_id: Option<String>,
}

impl UserSummary {
    /// Name to show in the console, falling back to the email.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// Snapshot of the current credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserSummary>,
}

impl Session {
    /// True when no credential or identity is held.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage backends
// ─────────────────────────────────────────────────────────────────────────────

/// Durable string key/value area the session is persisted in.
pub trait SessionStorage: Send + Sync + std::fmt::Debug {
    /// Read a key.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory storage, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON-file storage that survives restarts.
///
/// The file holds a flat object of string values. It is read on every
/// access so that two console processes sharing a file see each other's
/// writes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a storage backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create a storage at `<dir>/session.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    /// Get the session file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).map_err(|e| {
                    Error::Storage(format!("Failed to delete {}: {}", self.path.display(), e))
                })?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create session directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json).map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide holder of the current session.
///
/// Memory and storage are updated under one write lock, so readers always
/// see either the old or the new session, never a mix.
#[derive(Debug)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    current: RwLock<Session>,
}

/// Shared session store handle.
pub type SharedSessionStore = Arc<SessionStore>;

impl SessionStore {
    /// Create an empty store over `storage`. Call [`init`](Self::init) to
    /// rehydrate a previously persisted session.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            current: RwLock::new(Session::default()),
        }
    }

    /// Create a store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Rehydrate the session from storage.
    ///
    /// Returns `true` if an access or refresh token was found. A cached user
    /// that no longer parses is dropped rather than failing startup.
    pub fn init(&self) -> Result<bool> {
        let mut current = self.current.write();

        let access_token = self.storage.get(ACCESS_TOKEN_KEY)?;
        let refresh_token = self.storage.get(REFRESH_TOKEN_KEY)?;
        let user = match self.storage.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<UserSummary>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Discarding unreadable cached user: {}", e);
                    self.storage.remove(USER_KEY)?;
                    None
                }
            },
            None => None,
        };

        *current = Session {
            access_token,
            refresh_token,
            user,
        };

        let restored = current.access_token.is_some() || current.refresh_token.is_some();
        if restored {
            tracing::debug!("Session rehydrated from storage");
        }
        Ok(restored)
    }

    /// Start a new session after login or registration.
    ///
    /// If any storage write fails, the keys already written are removed and
    /// the store is left empty, so storage never holds half of two sessions.
    pub fn start(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: Option<&UserSummary>,
    ) -> Result<()> {
        let mut current = self.current.write();

        if let Err(e) = self.write_session(access_token, refresh_token, user) {
            tracing::warn!("Failed to persist new session, discarding it: {}", e);
            *current = Session::default();
            if let Err(cleanup) = self.remove_all() {
                tracing::warn!("Failed to remove partial session: {}", cleanup);
            }
            return Err(e);
        }

        *current = Session {
            access_token: Some(access_token.to_string()),
            refresh_token: refresh_token.map(str::to_string),
            user: user.cloned(),
        };
        tracing::info!("Session started");
        Ok(())
    }

    /// Store an access token obtained by renewing with `refresh_token`.
    ///
    /// The token is stored only if `refresh_token` is still the stored
    /// refresh token; returns `false` and changes nothing when the session
    /// was cleared or replaced while the renewal was out. On a storage error
    /// the in-memory token is already replaced.
    pub fn renew_access_token(&self, refresh_token: &str, access_token: &str) -> Result<bool> {
        let mut current = self.current.write();
        if current.refresh_token.as_deref() != Some(refresh_token) {
            return Ok(false);
        }
        current.access_token = Some(access_token.to_string());
        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;
        Ok(true)
    }

    /// Replace the cached user.
    pub fn set_user(&self, user: &UserSummary) -> Result<()> {
        let mut current = self.current.write();
        self.storage.set(USER_KEY, &serde_json::to_string(user)?)?;
        current.user = Some(user.clone());
        Ok(())
    }

    /// Remove every credential and the cached user.
    ///
    /// Memory is cleared even if storage fails; the first storage error is
    /// returned.
    pub fn clear(&self) -> Result<()> {
        let mut current = self.current.write();
        *current = Session::default();

        let result = self.remove_all();
        tracing::info!("Session cleared");
        result
    }

    fn write_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: Option<&UserSummary>,
    ) -> Result<()> {
        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;
        match refresh_token {
            Some(token) => self.storage.set(REFRESH_TOKEN_KEY, token)?,
            None => self.storage.remove(REFRESH_TOKEN_KEY)?,
        }
        match user {
            Some(user) => self.storage.set(USER_KEY, &serde_json::to_string(user)?),
            None => self.storage.remove(USER_KEY),
        }
    }

    /// Remove every key, returning the first error.
    fn remove_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.current.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<UserSummary> {
        self.current.read().user.clone()
    }

    /// True when an access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().access_token.is_some()
    }
}
