use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const OFFLINE_DIR: &str = ".offline";
pub const CONFIG_FILE: &str = ".offline/config.yaml";
pub const REDB_FILE: &str = ".offline/queue.redb";
pub const FILE_STORE_DIR: &str = ".offline/queue";
pub const LOCK_FILE: &str = ".offline/lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn offline_dir(root: &Path) -> PathBuf {
    root.join(OFFLINE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn redb_path(root: &Path) -> PathBuf {
    root.join(REDB_FILE)
}

pub fn file_store_dir(root: &Path) -> PathBuf {
    root.join(FILE_STORE_DIR)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_offline_dir() {
        let root = Path::new("/proj");
        assert_eq!(config_path(root), PathBuf::from("/proj/.offline/config.yaml"));
        assert!(redb_path(root).starts_with(offline_dir(root)));
        assert!(file_store_dir(root).starts_with(offline_dir(root)));
        assert!(lock_path(root).starts_with(offline_dir(root)));
    }
}
