use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PortKeeperError {
    #[error("no free port in range {start}-{end}")]
    PoolExhausted { start: u16, end: u16 },

    #[error("failed to acquire lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },

    #[error("registry persistence failed: {0}")]
    Registry(String),

    #[error("registry file {0} is corrupt")]
    CorruptRegistry(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PortKeeperError>;
