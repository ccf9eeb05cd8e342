//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "binary"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Binary entrypoint for the lifecycle hook."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use mcs_common::{init_tracing, AppConfig};
use mcs_core::{
    Collaborators, Controller, ControllerState, LifecycleEvent, StateStore, UnitStatus,
};
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "/etc/mcs/mcs.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("mcs-hook ", env!("CARGO_PKG_VERSION")),
    about = "Minecraft server lifecycle hook",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    #[command(about = "Provision the host and lay out the server installation")]
    Install,
    #[command(about = "Re-render configuration, reopen the port and start or restart the server")]
    ConfigChanged,
    #[command(about = "Relink the server artifact without restarting")]
    Upgrade,
    #[command(about = "Probe the running server and refresh the unit status")]
    UpdateStatus,
    #[command(about = "Print the last recorded unit status")]
    Status,
}

impl Commands {
    fn event(self) -> Option<LifecycleEvent> {
        match self {
            Commands::Install => Some(LifecycleEvent::Install),
            Commands::ConfigChanged => Some(LifecycleEvent::ConfigChanged),
            Commands::Upgrade => Some(LifecycleEvent::Upgrade),
            Commands::UpdateStatus => Some(LifecycleEvent::UpdateStatus),
            Commands::Status => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!(
            "mcs-hook {} ({})",
            env!("CARGO_PKG_VERSION"),
            if cfg!(debug_assertions) { "debug" } else { "release" }
        );
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG_PATH));
    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = Arc::new(loaded.config);
    init_tracing("mcs-hook", &config.logging)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");

    let store = StateStore::new(config.state.path.clone());
    let previous = store.load();

    let command = cli.command.unwrap_or(Commands::Status);
    let Some(event) = command.event() else {
        let status = previous
            .map(|state| state.status)
            .unwrap_or_default();
        print_status(None, &status)?;
        return Ok(());
    };

    let mut controller = Controller::new(Arc::clone(&config), Collaborators::system(&config));
    if let Some(state) = previous {
        controller = controller.with_state(state);
    }

    let outcome = controller.dispatch(event).await;
    persist(&store, &controller.snapshot_state());
    print_status(Some(event), controller.status())?;
    // A fatal outcome surfaces as a non-zero exit once status is recorded.
    outcome?;
    Ok(())
}

fn persist(store: &StateStore, state: &ControllerState) {
    if let Err(err) = store.save(state) {
        warn!(path = %store.path().display(), error = %err, "failed to persist controller state");
    }
}

/// One JSON line on stdout for the orchestrator; logs go to stderr and file.
fn print_status(event: Option<LifecycleEvent>, status: &UnitStatus) -> Result<()> {
    let line = serde_json::json!({
        "event": event.map(|event| event.as_str()),
        "status": status.kind(),
        "message": status.message(),
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
