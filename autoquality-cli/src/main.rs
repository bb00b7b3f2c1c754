//! AutoQuality CLI - Command-line interface
//!
//! Inspects and edits stored quality preferences, dry-runs the selection
//! policy, and runs the full engine against a simulated player.

mod commands;

use std::path::PathBuf;

use autoquality_core::AutoQualityError;
use autoquality_core::tracing_setup::{CliLogLevel, init_tracing};
use clap::Parser;

#[derive(Parser)]
#[command(name = "autoquality")]
#[command(about = "Automatic video playback quality selection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level
    #[arg(long, default_value = "info")]
    log_level: CliLogLevel,

    /// Directory for the full trace log
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Settings file (overrides AUTOQUALITY_SETTINGS_PATH)
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = commands::handle_command(cli.command, cli.settings).await;
    if let Some(error) = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<AutoQualityError>())
    {
        eprintln!("{}", error.user_message());
    }
    result
}
