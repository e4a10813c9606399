//! Credential storage.
//!
//! The backend hands out a single opaque bearer token at login.  A
//! [`TokenStore`] keeps it between calls; nothing here tracks expiry, a token
//! is dropped only when the server rejects it or the user logs out.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use url::Url;

use crate::Result;

/// Environment variable overriding the directory that holds token files.
pub const TOKEN_DIR_ENV: &str = "AGENTCHAT_TOKEN_DIR";

/// Storage for the single bearer token.
pub trait TokenStore: Send + Sync {
    /// Returns the stored token, if any.
    fn get(&self) -> Option<String>;

    /// Stores `token`, replacing any previous one.
    fn set(&self, token: &str) -> Result<()>;

    /// Removes the stored token.  Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// A token store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// A token store backed by a file.
///
/// Each API origin gets its own file, so logging in against a staging
/// backend does not clobber the token for a local one.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for the origin of `base_url` in the default directory.
    ///
    /// The directory is `$AGENTCHAT_TOKEN_DIR` if set, else `agentchat` in
    /// the platform config directory.
    pub fn for_origin(base_url: &Url) -> Result<Self> {
        let dir = token_dir(std::env::var_os(TOKEN_DIR_ENV)).ok_or_else(|| {
            crate::Error::validation(
                "cannot locate a config directory; set AGENTCHAT_TOKEN_DIR",
                Some("token_dir".to_string()),
            )
        })?;
        Ok(Self::new(dir.join(origin_file_name(base_url))))
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn token_dir(overridden: Option<OsString>) -> Option<PathBuf> {
    match overridden.filter(|dir| !dir.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => dirs::config_dir().map(|dir| dir.join("agentchat")),
    }
}

/// Maps an origin to a file name such as `http_localhost_3001.token`.
fn origin_file_name(base_url: &Url) -> String {
    let origin = base_url.origin().ascii_serialization();
    let mut name: String = origin
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    format!("{}.token", name.trim_matches('_'))
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot read token file");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
