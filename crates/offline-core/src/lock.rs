//! Cross-process exclusion for a `.offline/` root.
//!
//! The coordinator assumes it is the only writer of its storage key. Two
//! processes each holding a coordinator over the same root would overwrite
//! each other's checkpoints, so every process opens the store only while
//! holding this lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::paths;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory exclusive lock on `.offline/lock`. Released on drop.
#[derive(Debug)]
pub struct RootLock {
    _file: File,
    path: PathBuf,
}

impl RootLock {
    /// Take the lock without waiting. `None` when another handle holds it.
    pub fn try_acquire(root: &Path) -> Result<Option<Self>> {
        let path = paths::lock_path(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired root lock");
                Ok(Some(Self { _file: file, path }))
            }
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll for the lock until `timeout` elapses, then fail with
    /// [`SyncError::Locked`].
    pub fn acquire(root: &Path, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(root)? {
                return Ok(lock);
            }
            if start.elapsed() >= timeout {
                return Err(SyncError::Locked {
                    path: paths::offline_dir(root),
                    waited_ms: start.elapsed().as_millis(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_refused_until_first_drops() {
        let dir = TempDir::new().unwrap();
        let first = RootLock::try_acquire(dir.path()).unwrap().unwrap();
        assert!(first.path().ends_with("lock"));
        assert!(RootLock::try_acquire(dir.path()).unwrap().is_none());

        drop(first);
        assert!(RootLock::try_acquire(dir.path()).unwrap().is_some());
    }

    #[test]
    fn acquire_times_out_with_locked_error() {
        let dir = TempDir::new().unwrap();
        let _held = RootLock::try_acquire(dir.path()).unwrap().unwrap();
        let err = RootLock::acquire(dir.path(), Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, SyncError::Locked { .. }), "got: {err}");
        assert!(err.to_string().contains("in use by another process"));
    }

    #[test]
    fn acquire_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let held = RootLock::try_acquire(dir.path()).unwrap().unwrap();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            drop(held);
        });
        RootLock::acquire(dir.path(), Duration::from_secs(5)).unwrap();
        releaser.join().unwrap();
    }
}
