//! Aloe CLI - Command-line interface for the Aloe Location version history
//!
//! Provides `aloe version`, `aloe export`, `aloe import`, `aloe check`,
//! `aloe auto-backup`, `aloe daemon`, and other commands.

mod commands;

use aloe_core::VersioningSystem;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use commands::history::HistoryCommands;
use commands::schedule::AutoBackupArgs;
use commands::version::VersionCommands;

#[derive(Parser)]
#[command(name = "aloe")]
#[command(about = "Aloe Location - version history and backups")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to $ALOE_DATA_DIR, then ~/.aloe)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage versions
    Version {
        #[command(subcommand)]
        action: VersionCommands,
    },
    #[command(flatten)]
    History(HistoryCommands),
    /// Configure the auto-backup timer
    AutoBackup(AutoBackupArgs),
    /// Show versioning status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the auto-backup timer until interrupted
    Daemon,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let system = open_system(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Version { action } => commands::version::execute(action, &system),
        Commands::History(action) => commands::history::execute(action, &system),
        Commands::AutoBackup(args) => commands::schedule::execute_auto_backup(&args, &system),
        Commands::Status { json } => commands::schedule::execute_status(&system, json),
        Commands::Daemon => commands::schedule::execute_daemon(system),
    }
}

fn open_system(data_dir: Option<&Path>) -> anyhow::Result<VersioningSystem> {
    let system = VersioningSystem::open_default(data_dir)?;
    tracing::debug!(prefix = %system.config().key_prefix, "opened versioning store");
    Ok(system)
}
