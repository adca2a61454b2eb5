//! Session persistence
//!
//! Saves the transport's session state so a later run can resume without
//! re-authenticating. Keyed by username; the blob format is an
//! implementation detail of the transport, not a wire contract.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transport::SessionState;

/// Errors that can occur during session storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No saved session exists for the key
    #[error("no saved session for {0:?}")]
    NotFound(String),

    /// The key is empty or not safe to use as a file name
    #[error("session key {0:?} is empty or not filesystem-safe")]
    InvalidKey(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The stored blob could not be decoded
    #[error("malformed session blob: {0}")]
    Format(#[from] serde_json::Error),
}

/// Pluggable persistence for a client's session state
pub trait SessionStore: Send + Sync {
    /// Persists the state under the key, replacing any previous blob
    fn save(&self, key: &str, state: &SessionState) -> Result<(), StoreError>;

    /// Loads the state saved under the key
    ///
    /// Fails with [`StoreError::NotFound`] when nothing was saved yet.
    fn load(&self, key: &str) -> Result<SessionState, StoreError>;
}

/// Session store backed by one JSON file per key
///
/// Writes go to a temporary file first and are renamed into place, so a
/// concurrently running keep-alive task never observes a half-written blob.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Creates a store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || key.contains(['/', '\\', ':'])
            || key.contains("..")
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.session")))
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, key: &str, state: &SessionState) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let blob = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("session.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(key, path = %path.display(), "session saved");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<SessionState, StoreError> {
        let path = self.path_for(key)?;
        let blob = match fs::read_to_string(&path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&blob)?)
    }
}
