use std::path::{Path, PathBuf};

/// Resolve the project root holding `.offline/`.
///
/// Priority:
/// 1. `--root` flag / `OFFLINE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.offline/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, ".offline")
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn find_upward_locates_offline_dir_from_subdir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".offline")).unwrap();
        let subdir = dir.path().join("src/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        assert_eq!(find_upward(&subdir, ".offline").as_deref(), Some(dir.path()));
    }

    #[test]
    fn find_upward_returns_none_without_marker() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_upward(dir.path(), ".no-such-marker-dir"), None);
    }
}
