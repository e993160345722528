use std::path::{Path, PathBuf};

use crate::error::{PortKeeperError, Result};
use crate::models::{CorruptRegistryPolicy, Registry};

use super::atomic::write_atomic;

/// The registry JSON file. Does no locking of its own: callers hold the
/// [`FileLock`](super::lock::FileLock) across read-modify-write sequences.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    policy: CorruptRegistryPolicy,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: CorruptRegistryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CorruptRegistryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty registry file if there is none yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write(&Registry::new())
    }

    /// Parse the registry. A missing file is an empty registry; unreadable or
    /// corrupt files go through [`Self::recover`].
    pub fn read(&self) -> Result<Registry> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::new()),
            Err(e) => return self.recover(PortKeeperError::Io(e)),
        };
        match serde_json::from_str::<Registry>(&contents) {
            Ok(registry) => Ok(registry),
            Err(e) => {
                tracing::debug!(error = %e, "registry_parse_failed");
                self.recover(PortKeeperError::CorruptRegistry(self.path.clone()))
            }
        }
    }

    /// The single place a bad registry file is forgiven. Lenient mode starts
    /// over from an empty registry (the next commit overwrites the file);
    /// strict mode hands the failure back.
    fn recover(&self, failure: PortKeeperError) -> Result<Registry> {
        match self.policy {
            CorruptRegistryPolicy::Lenient => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %failure,
                    "registry_unreadable_treated_as_empty"
                );
                Ok(Registry::new())
            }
            CorruptRegistryPolicy::Strict => Err(failure),
        }
    }

    /// Persist the full mapping via temp file, fsync and atomic rename.
    pub fn write(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|e| {
            PortKeeperError::Registry(format!(
                "failed to write {}: {e}",
                self.path.display()
            ))
        })?;
        tracing::trace!(entries = registry.len(), "registry_written");
        Ok(())
    }
}
