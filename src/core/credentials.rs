use anyhow::{Context, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("credential store is unavailable")]
    Unavailable,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let credentials = Self {
            username: username.into(),
            password: password.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.username.trim().is_empty() {
            return Err(CredentialsError::EmptyUsername);
        }
        if self.password.is_empty() {
            return Err(CredentialsError::EmptyPassword);
        }
        Ok(())
    }

    pub fn basic_auth_header(&self) -> String {
        let token = BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Persistence backend for the console's credentials.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>>;
    fn save(&self, credentials: &Credentials) -> Result<()>;
    fn clear(&self) -> Result<()>;

    /// File to watch for out-of-band changes, if the store has one.
    fn watch_path(&self) -> Option<PathBuf> {
        None
    }
}

pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Option<PathBuf> {
        crate::core::settings::Settings::config_dir().map(|p| p.join(CREDENTIALS_FILE))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read credentials from {}", self.path.display())
        })?;

        let credentials: Credentials =
            serde_json::from_str(&content).context("Failed to parse stored credentials")?;
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credentials directory {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(credentials)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).with_context(|| {
            format!("Failed to open credentials file {}", self.path.display())
        })?;

        // `mode` only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .with_context(|| {
                    format!("Failed to restrict permissions on {}", self.path.display())
                })?;
        }

        file.write_all(content.as_bytes()).with_context(|| {
            format!("Failed to write credentials to {}", self.path.display())
        })?;

        tracing::info!(path = ?self.path, "Stored credentials");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = ?self.path, "Cleared credentials");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove credentials at {}", self.path.display())
            }),
        }
    }

    fn watch_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let slot = self.slot.lock().map_err(|_| CredentialsError::Unavailable)?;
        Ok(slot.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| CredentialsError::Unavailable)?;
        *slot = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| CredentialsError::Unavailable)?;
        *slot = None;
        Ok(())
    }
}

/// Authentication context handed to the API client.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn from_default_store() -> Result<Self> {
        let path = FileCredentialStore::default_path()
            .context("Could not determine config directory")?;
        Ok(Self::new(Arc::new(FileCredentialStore::new(path))))
    }

    pub fn credentials(&self) -> Result<Option<Credentials>> {
        self.store.load()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.load(), Ok(Some(_)))
    }

    pub fn authorization_header(&self) -> Result<Option<String>> {
        Ok(self.credentials()?.map(|c| c.basic_auth_header()))
    }

    pub fn login(&self, credentials: Credentials) -> Result<()> {
        credentials.validate()?;
        tracing::info!(username = %credentials.username, "Logging in");
        self.store.save(&credentials)
    }

    pub fn logout(&self) -> Result<()> {
        tracing::info!("Logging out");
        self.store.clear()
    }

    pub fn watch_path(&self) -> Option<PathBuf> {
        self.store.watch_path()
    }
}
