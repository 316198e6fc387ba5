//! Session credentials and 401 handling
//!
//! Credentials live behind a [`CredentialStore`] injected into the client.
//! What happens after a 401 (redirect, prompt, nothing) is decided by the
//! host through the `on_unauthorized` callback.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Access/refresh token pair for one authenticated session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Persistent home of the credential pair
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credentials>;
    fn set(&self, credentials: &Credentials) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credentials> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Credentials persisted as a small TOML file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/quickskills/credentials.toml` (platform equivalent)
    pub fn default_location() -> Result<Self, StoreError> {
        let dir = dirs::config_dir().ok_or(StoreError::NoLocation)?;
        Ok(Self::new(dir.join("quickskills").join("credentials.toml")))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> Result<Option<Credentials>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&contents)?))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credentials> {
        match self.load() {
            Ok(creds) => creds,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable credential file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Written to a sibling temp file, then renamed over the target
    fn set(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let contents = toml::to_string(credentials)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(contents.as_bytes())?;
        file.as_file().sync_all()?;
        owner_only(file.path())?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// Reads the bearer token for outgoing requests and cleans up after a 401
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            on_unauthorized: None,
        }
    }

    pub fn with_unauthorized_hook(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    pub fn auth_token(&self) -> Option<String> {
        self.store
            .get()
            .map(|c| c.access_token)
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store
            .get()
            .map(|c| c.refresh_token)
            .filter(|t| !t.is_empty())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.store.get()
    }

    pub fn store_credentials(&self, credentials: &Credentials) -> Result<(), StoreError> {
        self.store.set(credentials)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    /// Wipe stored credentials, then notify the host.
    ///
    /// Safe to call repeatedly; store failures are logged, not returned.
    pub fn handle_unauthorized(&self) {
        tracing::warn!("Session rejected by server, clearing stored credentials");
        if let Err(e) = self.store.clear() {
            tracing::error!("Failed to clear credentials: {}", e);
        }
        if let Some(ref hook) = self.on_unauthorized {
            hook();
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("has_hook", &self.on_unauthorized.is_some())
            .finish()
    }
}
