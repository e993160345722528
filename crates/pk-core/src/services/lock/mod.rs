//! Cross-process exclusive lock scoped to a lock-file path.
//!
//! Every registry read-modify-write runs while a [`FileLock`] is held. The
//! backend is picked at runtime from [`LockMethod`]; callers only ever see the
//! guard.

mod marker;
mod native;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{PortKeeperError, Result};
use crate::models::LockMethod;

pub use marker::marker_path;

enum Backend {
    Native(native::NativeLock),
    Marker(marker::MarkerLock),
}

/// Guard for an acquired lock. Dropping it releases the lock.
pub struct FileLock {
    path: PathBuf,
    backend: Option<Backend>,
}

impl FileLock {
    /// Block until the lock at `path` is ours.
    pub fn acquire(path: &Path, method: LockMethod) -> Result<Self> {
        touch(path).map_err(|e| lock_error(path, e))?;

        let backend = match resolve(method) {
            LockMethod::Marker => marker::MarkerLock::acquire(path).map(Backend::Marker),
            _ => native::NativeLock::acquire(path).map(Backend::Native),
        }
        .map_err(|e| lock_error(path, e))?;
        tracing::trace!(path = %path.display(), "lock_acquired");

        Ok(Self {
            path: path.to_path_buf(),
            backend: Some(backend),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and report any failure instead of leaving it to `Drop`.
    pub fn release(mut self) -> Result<()> {
        self.unlock().map_err(|e| lock_error(&self.path, e))
    }

    fn unlock(&mut self) -> std::io::Result<()> {
        match self.backend.take() {
            Some(Backend::Native(lock)) => lock.unlock(),
            Some(Backend::Marker(lock)) => lock.unlock(),
            None => Ok(()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "lock_release_failed");
        }
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("path", &self.path)
            .field("held", &self.backend.is_some())
            .finish()
    }
}

fn resolve(method: LockMethod) -> LockMethod {
    match method {
        LockMethod::Auto if native::AVAILABLE => LockMethod::Native,
        LockMethod::Auto => LockMethod::Marker,
        LockMethod::Native if !native::AVAILABLE => {
            tracing::warn!("native_lock_unavailable_using_marker");
            LockMethod::Marker
        }
        other => other,
    }
}

/// The lock file only has to exist; its contents are never read.
fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn lock_error(path: &Path, e: std::io::Error) -> PortKeeperError {
    PortKeeperError::Lock {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
