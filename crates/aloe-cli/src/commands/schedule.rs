//! Auto-backup CLI commands
//!
//! Handles: aloe auto-backup/status/daemon

use aloe_core::{AutoBackupScheduler, SchedulerState, VersioningSystem};
use clap::{Args, ValueEnum};
use std::sync::Arc;
use std::time::Duration;

use super::format_time;

/// Whether periodic backups should run
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// Arguments for `aloe auto-backup`
#[derive(Args)]
pub struct AutoBackupArgs {
    /// Turn periodic backups on or off
    #[arg(value_enum)]
    pub state: Toggle,
    /// Interval in minutes (keeps the current one if omitted)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Persist auto-backup settings
///
/// The timer itself runs in `aloe daemon`, which re-reads the settings while
/// it runs and exits once auto-backup is turned off.
pub fn execute_auto_backup(args: &AutoBackupArgs, system: &VersioningSystem) -> anyhow::Result<()> {
    let interval = match args.interval {
        Some(minutes) => minutes,
        None => system.metadata()?.backup_interval,
    };
    let metadata = system.set_auto_backup(args.state == Toggle::On, interval)?;

    if metadata.auto_backup_enabled {
        println!(
            "Auto-backup enabled every {} minute(s).",
            metadata.backup_interval
        );
    } else {
        println!("Auto-backup disabled.");
    }
    Ok(())
}

/// Print metadata and statistics
pub fn execute_status(system: &VersioningSystem, json: bool) -> anyhow::Result<()> {
    let metadata = system.metadata()?;
    let stats = system.stats()?;
    let current = system.current_version();

    if json {
        let output = serde_json::json!({
            "metadata": metadata,
            "stats": stats,
            "currentVersion": current,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Version History");
    println!("===============\n");
    println!("Versions: {} (max {})", stats.total_versions, metadata.max_versions);
    println!("Current: {}", current.as_deref().unwrap_or("none"));
    println!(
        "Automatic/manual: {}/{}",
        stats.automatic_backups, stats.manual_versions
    );
    println!("Size: {:.2} KB", kilobytes(stats.total_size_bytes));
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("Range: {} .. {}", format_time(oldest), format_time(newest));
    }

    println!();
    if metadata.auto_backup_enabled {
        println!("Auto-backup: every {} minute(s)", metadata.backup_interval);
        if let Some(next) = metadata.next_backup_at {
            println!("Next backup: {}", format_time(next));
        }
    } else {
        println!("Auto-backup: disabled");
    }
    match metadata.last_backup {
        Some(last) => println!("Last backup: {}", format_time(last)),
        None => println!("Last backup: never"),
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn kilobytes(bytes: usize) -> f64 {
    bytes as f64 / 1024.0
}

async fn wait_until_idle(scheduler: &AutoBackupScheduler) {
    while scheduler.state() == SchedulerState::Running {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Run the auto-backup timer until Ctrl-C or until it is disabled
pub fn execute_daemon(system: VersioningSystem) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let scheduler = AutoBackupScheduler::new(Arc::new(system));
        if scheduler.resume()? == SchedulerState::Idle {
            println!("Auto-backup is disabled; enable it with 'aloe auto-backup on'.");
            return Ok::<(), anyhow::Error>(());
        }

        println!("Auto-backup running. Press Ctrl-C to stop.");
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                scheduler.stop_auto_backup();
                println!("Stopped.");
            }
            () = wait_until_idle(&scheduler) => {
                println!("Auto-backup was disabled; stopping.");
            }
        }
        Ok(())
    })
}
