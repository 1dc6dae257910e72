use crate::output::print_json;
use anyhow::Context;
use std::io::Read;
use std::path::Path;

pub fn run(root: &Path, payload: &str, json: bool) -> anyhow::Result<()> {
    let raw = if payload == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        buf
    } else {
        payload.to_string()
    };

    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).context("payload is not valid JSON")?;

    let config = super::load_config(root)?;
    let session = super::open_session(root, &config)?;
    let action = session
        .coordinator
        .queue_action(value)
        .context("failed to queue action")?;

    if json {
        print_json(&action)?;
    } else {
        println!("{}", action.id);
    }
    Ok(())
}
