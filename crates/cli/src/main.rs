use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use foundry_api::FoundryClient;
use foundry_engine::{Orchestrator, load_settings, load_settings_from_path};
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod commands;

/// Multi-step orchestration over the Foundry control plane.
///
/// The API endpoint and token are read from FOUNDRY_API_BASE and
/// FOUNDRY_API_TOKEN.
#[derive(Debug, Parser)]
#[command(name = "foundry", version, about)]
struct Cli {
    /// Engine settings file (defaults to FOUNDRY_CONFIG_PATH or <config dir>/foundry/engine.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cancel the workflow when it runs longer than this many seconds
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("failed to load engine settings")?;
    let client = FoundryClient::new_from_env().context("failed to configure the API client")?;
    let orchestrator = Orchestrator::new(Arc::new(client), settings);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling workflow");
            interrupt.cancel();
        }
    });

    let deadline = cli.deadline_secs.map(Duration::from_secs);
    let output = commands::run(&orchestrator, cli.command, &cancel, deadline).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
