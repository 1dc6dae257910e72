mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "offline",
    about = "Queue mutations while offline and replay them in order once the network is back",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .offline/ or .git/)
    #[arg(long, global = true, env = "OFFLINE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .offline/ and a default config
    Init {
        /// Replay endpoint written into a new config
        #[arg(long)]
        endpoint: Option<String>,
        /// Store backend for a new config: redb, file or memory
        #[arg(long, value_parser = ["redb", "file", "memory"])]
        backend: Option<String>,
    },

    /// Queue one JSON payload (`-` reads it from stdin)
    Enqueue {
        payload: String,
    },

    /// List pending actions, oldest first
    List,

    /// Probe connectivity and show queue status
    Status,

    /// Replay pending actions against the configured endpoint
    Sync {
        /// Skip the connectivity probe and treat the network as reachable
        #[arg(long)]
        assume_online: bool,
    },

    /// Watch connectivity and replay automatically on reconnect (Ctrl-C to stop)
    Watch,

    /// Inspect and validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { endpoint, backend } => {
            cmd::init::run(&root, endpoint.as_deref(), backend.as_deref())
        }
        Commands::Enqueue { payload } => cmd::enqueue::run(&root, &payload, cli.json),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Sync { assume_online } => cmd::sync::run(&root, assume_online, cli.json),
        Commands::Watch => cmd::watch::run(&root),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
