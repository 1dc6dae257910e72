use crate::output::print_json;
use anyhow::Context;
use offline_core::monitor::probe_once;
use offline_core::{ConnectivityState, SkipReason, SyncCoordinator, SyncReport};
use std::path::Path;

pub fn run(root: &Path, assume_online: bool, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    if config.endpoint.is_none() {
        anyhow::bail!("no endpoint configured: set `endpoint` in .offline/config.yaml");
    }

    let rt = tokio::runtime::Runtime::new()?;
    let state = if assume_online {
        ConnectivityState::READY
    } else {
        rt.block_on(probe_once(&config.probe))
    };

    let session = super::open_session(root, &config)?;
    let report = rt.block_on(drive(&session.coordinator, state))?;
    drop(session);

    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

/// Feed one connectivity observation to the coordinator and wait for the
/// sync it triggers. A not-ready observation still runs `sync()` so the
/// caller gets a skipped report.
pub(crate) async fn drive(
    coordinator: &SyncCoordinator,
    state: ConnectivityState,
) -> anyhow::Result<SyncReport> {
    let report = match coordinator.on_connectivity(state) {
        Some(handle) => handle.await.context("sync task did not complete")??,
        None => coordinator.sync().await?,
    };
    Ok(report)
}

fn print_report(report: &SyncReport) {
    match report.skipped {
        Some(SkipReason::NotReady) => {
            println!("Not synced: network is not reachable.");
            println!("pending: {}", report.remaining);
            return;
        }
        Some(SkipReason::EmptyQueue) => {
            println!("Nothing to sync.");
            return;
        }
        None => {}
    }
    println!("replayed: {}", report.replayed);
    println!("pending:  {}", report.remaining);
    if report.interrupted {
        println!("Connectivity dropped; remaining actions stay queued.");
    }
}
