use crate::output::print_json;
use chrono::Utc;
use offline_core::monitor::probe_once;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Status {
    online: bool,
    reachable: bool,
    pending: usize,
    failing: usize,
    oldest_age_secs: Option<i64>,
    endpoint: Option<String>,
    probe: String,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;

    // Probe before locking so a slow network doesn't hold up other commands.
    let rt = tokio::runtime::Runtime::new()?;
    let state = rt.block_on(probe_once(&config.probe));

    let actions = super::open_session(root, &config)?
        .coordinator
        .pending_actions();
    let status = Status {
        online: state.is_online,
        reachable: state.is_reachable,
        pending: actions.len(),
        failing: actions.iter().filter(|a| a.last_error.is_some()).count(),
        oldest_age_secs: actions
            .first()
            .map(|a| (Utc::now() - a.enqueued_at).num_seconds()),
        endpoint: config.endpoint.clone(),
        probe: format!("{}:{}", config.probe.host, config.probe.port),
    };

    if json {
        return print_json(&status);
    }

    println!("online:     {}", yes_no(status.online));
    println!("reachable:  {}  (probe {})", yes_no(status.reachable), status.probe);
    println!("pending:    {}", status.pending);
    if status.failing > 0 {
        println!("failing:    {}", status.failing);
    }
    if let Some(age) = status.oldest_age_secs {
        println!("oldest:     {age}s ago");
    }
    println!(
        "endpoint:   {}",
        status.endpoint.as_deref().unwrap_or("(not configured)")
    );
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
