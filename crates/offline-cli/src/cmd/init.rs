use anyhow::Context;
use offline_core::{
    config::{StoreBackend, SyncConfig},
    io, paths,
};
use std::path::Path;

pub fn run(root: &Path, endpoint: Option<&str>, backend: Option<&str>) -> anyhow::Result<()> {
    println!("Initializing offline queue in: {}", root.display());

    let dir = paths::offline_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        if endpoint.is_some() || backend.is_some() {
            println!("  note: existing config left unchanged; edit it directly");
        }
        return Ok(());
    }

    let mut cfg = SyncConfig {
        endpoint: endpoint.map(str::to_string),
        ..SyncConfig::default()
    };
    if let Some(name) = backend {
        cfg.backend = parse_backend(name)?;
    }
    cfg.save(root).context("failed to write config.yaml")?;
    println!("  created: {}", paths::CONFIG_FILE);

    if cfg.endpoint.is_none() {
        println!("\nNo endpoint set. Add `endpoint:` to {} before syncing.", paths::CONFIG_FILE);
    }
    Ok(())
}

fn parse_backend(name: &str) -> anyhow::Result<StoreBackend> {
    match name {
        "redb" => Ok(StoreBackend::Redb),
        "file" => Ok(StoreBackend::File),
        "memory" => Ok(StoreBackend::Memory),
        other => anyhow::bail!("unknown backend '{other}': expected redb, file or memory"),
    }
}
