//! core::lock
//!
//! Exclusive lock on a projects directory.
//!
//! # Architecture
//!
//! The manager API takes `&mut self` for every mutating operation, which
//! rules out concurrent orchestration inside one process. Hosts that run
//! several processes against the same projects directory take this lock
//! around their batch calls.
//!
//! # Storage
//!
//! - `<projects_dir>/.reloadkit.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock acquisition is non-blocking (fails fast if locked)
//! - Lock is automatically released on drop
//!
//! # Example
//!
//! ```no_run
//! use reloadkit::core::lock::ProjectsLock;
//! use std::path::Path;
//!
//! let lock = ProjectsLock::acquire(Path::new("/srv/projects")).unwrap();
//! // ... recompile everything ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("projects directory is locked by another process")]
    AlreadyLocked,

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a projects directory, released on drop.
#[derive(Debug)]
pub struct ProjectsLock {
    path: PathBuf,
    /// `Some` while the lock is held.
    file: Option<File>,
}

impl ProjectsLock {
    /// Attempt to acquire the lock for `projects_dir`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(projects_dir: &Path) -> Result<Self, LockError> {
        fs::create_dir_all(projects_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", projects_dir.display(), e))
        })?;

        let path = paths::lock_path(projects_dir);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired projects lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` if it is already held.
    pub fn try_acquire(projects_dir: &Path) -> Result<Option<Self>, LockError> {
        match Self::acquire(projects_dir) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard is dropped.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ProjectsLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
