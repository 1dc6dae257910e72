use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not initialized: run 'offline init'")]
    NotInitialized,

    #[error("store error: {0}")]
    Store(String),

    #[error("replay of action {id} failed after {replayed} replayed: {reason}")]
    Replay {
        id: Uuid,
        replayed: usize,
        reason: String,
    },

    #[error("{} is in use by another process (waited {waited_ms}ms)", .path.display())]
    Locked { path: PathBuf, waited_ms: u128 },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("no Tokio runtime: start() must be called from async context")]
    NoRuntime,

    #[error("unsupported queue format version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
