//! Durable storage for the session blob.
//!
//! The session is written as pretty-printed JSON to a single fixed path.
//! Writes are plain overwrites; there is no versioning and no schema.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::credentials::enforce_private_file_permissions;
use crate::telegram::Session;

/// Errors from reading or writing the session file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The file exists but could not be read or written.
    #[error("session file {path}: {source}")]
    Io {
        /// Path of the session file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file exists but does not hold valid JSON.
    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        /// Path of the session file.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
}

/// Loads and saves the session blob at a fixed path.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// Returns `Ok(None)` when no session has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Corrupt`] if the file is not valid JSON and
    /// [`SessionError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored session");
                return Ok(None);
            }
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let value: serde_json::Value =
            serde_json::from_str(&contents).map_err(|source| SessionError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(Session(value)))
    }

    /// Overwrite the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file or its parent directory
    /// cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents = serde_json::to_string_pretty(&session.0).map_err(|e| SessionError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(ErrorKind::InvalidData, e),
        })?;
        write_private(&self.path, contents.as_bytes()).map_err(io_err)?;

        // The creation mode only applies to new files; narrow an existing one.
        enforce_private_file_permissions(&self.path).map_err(|e| SessionError::Io {
            path: self.path.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }
}

/// Write `contents` to `path`, creating the file owner-only from the start.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
