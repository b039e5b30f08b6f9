//! Durable token storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use urban_guard_core::{Credential, TOKEN_STORAGE_KEY};

/// Persistence seam for the single bearer token.
pub trait TokenStorage: Send + Sync {
    /// Reads the stored token, if any.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the backing store cannot be read.
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Replaces the stored token.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the token cannot be written.
    fn store(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Removes the stored token. Removing an absent token succeeds.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the backing store cannot be modified.
    fn remove(&self) -> Result<(), StorageError>;
}

/// Token storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("token file {path}: {source}")]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
}

/// Process-local token storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<Credential>>,
}

impl MemoryTokenStorage {
    /// Creates storage pre-populated with `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            token: Mutex::new(Some(credential)),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// File-backed token storage.
///
/// The token lives in a file named after [`TOKEN_STORAGE_KEY`] inside the
/// configured directory. Writes go through a sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Stores the token under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKEN_STORAGE_KEY),
        }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        match fs::read_to_string(&self.path) {
            // A blank file is treated like a missing one.
            Ok(raw) => Ok(Credential::new(raw).ok()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.io_error(error)),
        }
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| self.io_error(error))?;
        }

        let staging = self.path.with_extension("tmp");
        fs::write(&staging, credential.as_str()).map_err(|error| self.io_error(error))?;
        restrict_permissions(&staging).map_err(|error| self.io_error(error))?;
        fs::rename(&staging, &self.path).map_err(|error| self.io_error(error))
    }

    fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
