use crate::error::{Result, SyncError};
use crate::paths;
use crate::store::{FileStore, KeyValueStore, MemoryStore, RedbStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Single redb database at `.offline/queue.redb`.
    #[default]
    Redb,
    /// One JSON file per key under `.offline/queue/`.
    File,
    /// Not durable. Only useful for dry runs.
    Memory,
}

// ---------------------------------------------------------------------------
// ProbeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_port")]
    pub port: u16,
    #[serde(default = "default_probe_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

fn default_probe_host() -> String {
    "one.one.one.one".to_string()
}

fn default_probe_port() -> u16 {
    443
}

fn default_probe_interval() -> u64 {
    5_000
}

fn default_probe_timeout() -> u64 {
    2_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            interval_ms: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Key the coordinator owns in the durable store.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub backend: StoreBackend,
    /// URL each pending payload is POSTed to during sync.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-replay deadline. `None` waits indefinitely.
    #[serde(default)]
    pub replay_timeout_ms: Option<u64>,
    /// Deadline for one HTTP replay request, connect to last byte.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
    /// How long a command waits for another process to release `.offline/`.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub probe: ProbeConfig,
}

fn default_storage_key() -> String {
    "pendingActions".to_string()
}

fn default_http_timeout() -> u64 {
    30_000
}

fn default_lock_timeout() -> u64 {
    5_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            backend: StoreBackend::default(),
            endpoint: None,
            replay_timeout_ms: None,
            http_timeout_ms: default_http_timeout(),
            lock_timeout_ms: default_lock_timeout(),
            probe: ProbeConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SyncError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: SyncConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn replay_timeout(&self) -> Option<Duration> {
        self.replay_timeout_ms.map(Duration::from_millis)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Open the configured backend rooted at `root`.
    pub fn open_store(&self, root: &Path) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.backend {
            StoreBackend::Redb => Arc::new(RedbStore::open(&paths::redb_path(root))?),
            StoreBackend::File => Arc::new(FileStore::new(&paths::file_store_dir(root))),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.storage_key.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "storage_key must not be empty".to_string(),
            });
        }

        match self.endpoint.as_deref() {
            None => warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no endpoint configured: sync has nowhere to replay actions".to_string(),
            }),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("endpoint '{url}' is not an http(s) URL"),
                })
            }
            Some(_) => {}
        }

        if self.backend == StoreBackend::Memory {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "memory backend does not survive restarts".to_string(),
            });
        }

        if self.probe.interval_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "probe.interval_ms must be greater than zero".to_string(),
            });
        }

        if self.probe.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "probe.timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.http_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "http_timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.replay_timeout_ms == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "replay_timeout_ms of 0 fails every replay".to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg: SyncConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.storage_key, "pendingActions");
        assert_eq!(cfg.backend, StoreBackend::Redb);
        assert_eq!(cfg.probe.port, 443);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_probe_section_fills_defaults() {
        let cfg: SyncConfig = serde_yaml::from_str(
            "backend: file\nprobe:\n  host: example.com\nreplay_timeout_ms: 1500\n",
        )
        .unwrap();
        assert_eq!(cfg.backend, StoreBackend::File);
        assert_eq!(cfg.probe.host, "example.com");
        assert_eq!(cfg.probe.interval_ms, 5_000);
        assert_eq!(cfg.replay_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn load_without_init_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let err = SyncConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::NotInitialized));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let cfg = SyncConfig {
            endpoint: Some("https://api.example.com/replay".into()),
            ..Default::default()
        };
        cfg.save(dir.path()).unwrap();
        assert_eq!(SyncConfig::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn validate_flags_missing_endpoint_and_bad_probe() {
        let mut cfg = SyncConfig::default();
        cfg.probe.interval_ms = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("endpoint")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("interval")));
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let cfg = SyncConfig {
            endpoint: Some("ftp://nope".into()),
            ..Default::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("ftp://nope")));
    }

    #[test]
    fn valid_config_has_no_warnings() {
        let cfg = SyncConfig {
            endpoint: Some("http://localhost:8080/actions".into()),
            ..Default::default()
        };
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn open_store_file_backend_writes_under_offline_dir() {
        let dir = TempDir::new().unwrap();
        let cfg = SyncConfig {
            backend: StoreBackend::File,
            ..Default::default()
        };
        let store = cfg.open_store(dir.path()).unwrap();
        store.set("pendingActions", "[]").unwrap();
        assert!(paths::file_store_dir(dir.path())
            .join("pendingActions.json")
            .exists());
    }
}
