//! Version CLI commands
//!
//! Handles: aloe version create/list/show/delete/restore/diff

use aloe_core::VersioningSystem;
use anyhow::Context;
use clap::Subcommand;
use std::io::{self, Write};

use super::format_time;

/// Version commands
#[derive(Subcommand)]
pub enum VersionCommands {
    /// Create a version of the current data
    Create {
        /// What triggered this version
        #[arg(short, long)]
        description: String,
        /// Change log line (can specify multiple times)
        #[arg(short, long = "change")]
        changes: Vec<String>,
        /// Author (defaults to the configured default author)
        #[arg(short, long)]
        author: Option<String>,
    },
    /// List all versions, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version details
    Show {
        /// Version label, e.g. 1.0.3
        label: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a version
    Delete {
        /// Version label
        label: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Restore the data of a version
    Restore {
        /// Version label
        label: String,
    },
    /// Compare two versions
    Diff {
        /// Older version label
        from: String,
        /// Newer version label
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute version command
pub fn execute(cmd: VersionCommands, system: &VersioningSystem) -> anyhow::Result<()> {
    match cmd {
        VersionCommands::Create {
            description,
            changes,
            author,
        } => {
            let version = system.create_version(&description, changes, author.as_deref())?;
            println!("Created version {} ({})", version.version, version.hash);
        }
        VersionCommands::List { json } => execute_list(system, json)?,
        VersionCommands::Show { label, json } => execute_show(system, &label, json)?,
        VersionCommands::Delete { label, force } => execute_delete(system, &label, force)?,
        VersionCommands::Restore { label } => {
            let outcome = system.restore_version(&label)?;
            println!("Restored version {}.", outcome.restored.version);
            println!("Safety version created: {}", outcome.safety.version);
            println!("Reload the application to pick up the restored data.");
        }
        VersionCommands::Diff { from, to, json } => {
            let diff = system.compare_versions(&from, &to)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
                return Ok(());
            }

            println!("{} -> {}: {}", diff.from, diff.to, diff.one_line());
            for change in diff.collections.iter().filter(|c| c.changed) {
                println!("  {}: {} -> {}", change.key, change.before, change.after);
            }
            for key in &diff.settings_added {
                println!("  + setting {key}");
            }
            for key in &diff.settings_removed {
                println!("  - setting {key}");
            }
            for key in &diff.settings_changed {
                println!("  ~ setting {key}");
            }
        }
    }
    Ok(())
}

fn execute_list(system: &VersioningSystem, json: bool) -> anyhow::Result<()> {
    let versions = system.versions()?;

    if json {
        let rows: Vec<serde_json::Value> = versions
            .iter()
            .map(|v| {
                serde_json::json!({
                    "version": v.version,
                    "timestamp": v.timestamp,
                    "description": v.description,
                    "author": v.author,
                    "changes": v.changes,
                    "hash": v.hash,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("No versions found.");
        return Ok(());
    }

    let current = system.current_version();
    println!("Versions:");
    for v in &versions {
        let marker = if current.as_deref() == Some(v.version.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            " {marker} {} - {} - {} ({})",
            v.version,
            format_time(v.timestamp),
            v.description,
            v.author
        );
    }
    Ok(())
}

fn execute_show(system: &VersioningSystem, label: &str, json: bool) -> anyhow::Result<()> {
    let version = system
        .version(label)?
        .with_context(|| format!("Version not found: {label}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    println!("Version: {}", version.version);
    println!("Created: {}", format_time(version.timestamp));
    println!("Description: {}", version.description);
    println!("Author: {}", version.author);
    println!("Hash: {}", version.hash);
    if !version.changes.is_empty() {
        println!("\nChanges:");
        for change in &version.changes {
            println!("  - {change}");
        }
    }
    println!("\nData ({} records):", version.data.record_count());
    println!("  Users: {}", version.data.users.len());
    println!("  Insurance types: {}", version.data.insurance_types.len());
    println!("  Sales: {}", version.data.sales.len());
    println!("  Objectives: {}", version.data.objectives.len());
    println!("  Settings: {}", version.data.settings.len());
    println!("  Credentials: {}", version.data.credential_digests.len());
    Ok(())
}

fn execute_delete(system: &VersioningSystem, label: &str, force: bool) -> anyhow::Result<()> {
    let version = system
        .version(label)?
        .with_context(|| format!("Version not found: {label}"))?;

    if !force {
        print!(
            "Delete version {} ({})? [y/N] ",
            version.version, version.description
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    system.delete_version(label)?;
    println!("Deleted version {label}");
    Ok(())
}
