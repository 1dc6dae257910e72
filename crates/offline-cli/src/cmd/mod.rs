pub mod config;
pub mod enqueue;
pub mod init;
pub mod list;
pub mod status;
pub mod sync;
pub mod watch;

use anyhow::Context;
use offline_core::{
    FnReplay, HttpReplay, PendingAction, ReplayError, ReplayHandler, RootLock, SyncConfig,
    SyncCoordinator,
};
use std::path::Path;
use std::sync::Arc;

/// A coordinator over the root's queue plus the lock that makes it the only
/// writer. Drop the session to let other `offline` processes in.
pub struct Session {
    pub coordinator: SyncCoordinator,
    _lock: RootLock,
}

pub fn load_config(root: &Path) -> anyhow::Result<SyncConfig> {
    SyncConfig::load(root).context("failed to load config")
}

/// Lock the root, then open the store and hydrate a coordinator.
pub fn open_session(root: &Path, config: &SyncConfig) -> anyhow::Result<Session> {
    let lock = RootLock::acquire(root, config.lock_timeout())?;
    session_with(root, config, lock)
}

/// Like [`open_session`] but gives up immediately when another process
/// holds the root.
pub fn try_open_session(root: &Path, config: &SyncConfig) -> anyhow::Result<Option<Session>> {
    match RootLock::try_acquire(root)? {
        Some(lock) => session_with(root, config, lock).map(Some),
        None => Ok(None),
    }
}

fn session_with(root: &Path, config: &SyncConfig, lock: RootLock) -> anyhow::Result<Session> {
    let store = config
        .open_store(root)
        .context("failed to open queue store")?;
    let coordinator = SyncCoordinator::new(store, replay_handler(config)?, config)
        .context("failed to open offline queue")?;
    Ok(Session {
        coordinator,
        _lock: lock,
    })
}

/// HTTP replay when an endpoint is configured; otherwise every replay fails.
fn replay_handler(config: &SyncConfig) -> anyhow::Result<Arc<dyn ReplayHandler>> {
    let handler: Arc<dyn ReplayHandler> = match config.endpoint.as_deref() {
        Some(url) => Arc::new(HttpReplay::with_timeout(url, config.http_timeout())?),
        None => Arc::new(FnReplay::new(|_action: PendingAction| async {
            Err(ReplayError::new("no endpoint configured"))
        })),
    };
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::config::StoreBackend;
    use serde_json::json;
    use tempfile::TempDir;

    fn file_config() -> SyncConfig {
        SyncConfig {
            backend: StoreBackend::File,
            lock_timeout_ms: 100,
            ..SyncConfig::default()
        }
    }

    #[test]
    fn second_session_on_same_root_is_refused() {
        let dir = TempDir::new().unwrap();
        let cfg = file_config();
        let _held = open_session(dir.path(), &cfg).unwrap();

        assert!(try_open_session(dir.path(), &cfg).unwrap().is_none());
        let err = open_session(dir.path(), &cfg).err().expect("root is locked");
        assert!(format!("{err:#}").contains("in use by another process"));
    }

    #[test]
    fn sequential_sessions_never_lose_queued_actions() {
        let dir = TempDir::new().unwrap();
        let cfg = file_config();

        // One process queues, releases, a second queues, then a third
        // hydrates: both survive regardless of which process syncs next.
        {
            let a = open_session(dir.path(), &cfg).unwrap();
            a.coordinator.queue_action(json!("a")).unwrap();
        }
        {
            let b = open_session(dir.path(), &cfg).unwrap();
            assert_eq!(b.coordinator.pending_count(), 1);
            b.coordinator.queue_action(json!("b")).unwrap();
        }
        let c = open_session(dir.path(), &cfg).unwrap();
        let payloads: Vec<_> = c
            .coordinator
            .pending_actions()
            .into_iter()
            .map(|a| a.payload)
            .collect();
        assert_eq!(payloads, vec![json!("a"), json!("b")]);
    }
}
