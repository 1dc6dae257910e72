use offline_core::{
    ConnectivityMonitor, ConnectivityState, ProbeMonitor, SyncConfig, SyncError,
};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub fn run(root: &Path) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    if config.endpoint.is_none() {
        anyhow::bail!("no endpoint configured: set `endpoint` in .offline/config.yaml");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(watch(root, &config))
}

/// Follow the probe until Ctrl-C. The queue is opened (and `.offline/`
/// locked) only while draining, so `offline enqueue` from another shell
/// gets in between polls.
async fn watch(root: &Path, config: &SyncConfig) -> anyhow::Result<()> {
    let monitor = ProbeMonitor::spawn(config.probe.clone());
    let mut events = monitor.subscribe();
    info!(
        probe = %format!("{}:{}", config.probe.host, config.probe.port),
        "watching connectivity"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut previous = ConnectivityState::OFFLINE;
    // Set after a failed replay; cleared by the next not-ready poll.
    let mut halted = false;
    loop {
        let state = tokio::select! {
            res = &mut shutdown => {
                res?;
                break;
            }
            event = events.recv() => match event {
                Ok(state) => state,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connectivity events lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        if state != previous {
            info!(online = state.is_online, reachable = state.is_reachable, "connectivity changed");
        }
        previous = state;

        if !state.is_ready() {
            halted = false;
            continue;
        }
        if !halted {
            halted = drain(root, config, state).await;
        }
    }

    info!("stopped");
    Ok(())
}

/// Replay whatever is queued. Returns true when a replay failed and
/// draining should wait for the next reconnect.
async fn drain(root: &Path, config: &SyncConfig, state: ConnectivityState) -> bool {
    let session = match super::try_open_session(root, config) {
        Ok(Some(session)) => session,
        Ok(None) => {
            debug!("queue in use by another process, retrying next poll");
            return false;
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "failed to open queue");
            return false;
        }
    };
    if session.coordinator.pending_count() == 0 {
        return false;
    }

    match super::sync::drive(&session.coordinator, state).await {
        Ok(report) => {
            info!(replayed = report.replayed, remaining = report.remaining, "synced");
            false
        }
        Err(e) => {
            let replay_failed = matches!(e.downcast_ref::<SyncError>(), Some(SyncError::Replay { .. }));
            warn!(error = %format!("{e:#}"), "sync failed");
            replay_failed
        }
    }
}
