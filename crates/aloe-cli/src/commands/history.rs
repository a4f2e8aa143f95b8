//! Registry-wide CLI commands
//!
//! Handles: aloe export/import/check/repair/cleanup/retention

use aloe_core::VersioningSystem;
use clap::Subcommand;
use std::path::PathBuf;

/// Commands that operate on the whole version history
#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Export the version history as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the version history with an exported one
    Import {
        /// Export file to read
        file: PathBuf,
    },
    /// Verify stored hashes and metadata
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Repair hash mismatches and metadata counters
    Repair,
    /// Delete all but the newest versions
    Cleanup {
        /// Number of versions to keep
        #[arg(short, long, default_value_t = 20)]
        keep: usize,
    },
    /// Set the maximum number of stored versions
    Retention {
        /// New retention cap
        max: usize,
    },
}

/// Execute history command
pub fn execute(cmd: HistoryCommands, system: &VersioningSystem) -> anyhow::Result<()> {
    match cmd {
        HistoryCommands::Export { output } => match output {
            Some(path) => {
                system.export_to_file(&path)?;
                println!("Exported version history to {}", path.display());
            }
            None => println!("{}", system.export_versions()?),
        },
        HistoryCommands::Import { file } => {
            let count = system.import_from_file(&file)?;
            println!("Imported {count} version(s) from {}", file.display());
            println!("Reload the application to pick up the imported history.");
        }
        HistoryCommands::Check { json } => {
            let report = system.check_integrity()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.valid {
                println!("Integrity check passed.");
            } else {
                println!("Integrity check failed:");
                for error in &report.errors {
                    println!("  - {error}");
                }
            }
            if !report.valid {
                anyhow::bail!("{} integrity error(s) found", report.errors.len());
            }
        }
        HistoryCommands::Repair => {
            if system.repair_data()? {
                println!("Version data is valid.");
            } else {
                anyhow::bail!("Some versions could not be repaired; run 'aloe check' for details");
            }
        }
        HistoryCommands::Cleanup { keep } => {
            let deleted = system.cleanup_old_versions(keep)?;
            println!("Deleted {deleted} old version(s), kept at most {keep}.");
        }
        HistoryCommands::Retention { max } => {
            let evicted = system.set_max_versions(max)?;
            println!("Retention set to {max} version(s).");
            if evicted > 0 {
                println!("Evicted {evicted} old version(s).");
            }
        }
    }
    Ok(())
}
