use crate::output::{print_json, print_table, truncate};
use std::path::Path;

const PAYLOAD_WIDTH: usize = 48;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let actions = super::open_session(root, &config)?
        .coordinator
        .pending_actions();

    if json {
        return print_json(&actions);
    }

    if actions.is_empty() {
        println!("No pending actions.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = actions
        .iter()
        .map(|a| {
            let id = a.id.to_string();
            vec![
                id.chars().take(8).collect(),
                a.enqueued_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                a.attempts.to_string(),
                truncate(&a.payload.to_string(), PAYLOAD_WIDTH),
                a.last_error.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "ENQUEUED", "ATTEMPTS", "PAYLOAD", "LAST ERROR"], rows);
    Ok(())
}
