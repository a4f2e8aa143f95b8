//! Auto-backup scheduler
//!
//! A tokio task that creates a version every `backupInterval` minutes. The
//! next fire time is persisted in the backup metadata, so a restarted process
//! resumes the schedule instead of starting over: a fire time already in the
//! past triggers one immediate catch-up backup.
//!
//! The timer re-reads the persisted settings while it sleeps and again in
//! the transaction of every tick, so disabling auto-backup from another
//! process stops it and an interval change reschedules it.

use crate::error::{VersioningError, VersioningResult};
use crate::version::BackupMetadata;
use crate::versioning::{interval_duration, ScheduledBackup, VersioningSystem};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Whether the timer task is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Periodic version creation
pub struct AutoBackupScheduler {
    system: Arc<VersioningSystem>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoBackupScheduler {
    /// Create an idle scheduler
    #[must_use]
    pub fn new(system: Arc<VersioningSystem>) -> Self {
        Self {
            system,
            task: Mutex::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        match task.as_ref() {
            Some(handle) if !handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Idle,
        }
    }

    /// Persist new settings, stop any running timer, and start a new one if enabled
    ///
    /// Must be called from within a tokio runtime when `enabled` is true.
    ///
    /// # Errors
    /// Returns an error if the interval is invalid, metadata cannot be
    /// written, or no tokio runtime is available
    pub fn configure_auto_backup(
        &self,
        enabled: bool,
        interval_minutes: u64,
    ) -> VersioningResult<SchedulerState> {
        let metadata = self.system.set_auto_backup(enabled, interval_minutes)?;
        self.stop_auto_backup();
        if enabled {
            self.start(&metadata)?;
        }
        tracing::info!(enabled, interval_minutes, "auto-backup configured");
        Ok(self.state())
    }

    /// Start the timer from persisted metadata (process start)
    ///
    /// # Errors
    /// Returns an error if metadata cannot be read or no tokio runtime is available
    pub fn resume(&self) -> VersioningResult<SchedulerState> {
        let metadata = self.system.metadata()?;
        self.stop_auto_backup();
        if metadata.auto_backup_enabled {
            self.start(&metadata)?;
        }
        Ok(self.state())
    }

    /// Stop the timer without changing persisted settings
    pub fn stop_auto_backup(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::debug!("auto-backup timer stopped");
        }
    }

    fn start(&self, metadata: &BackupMetadata) -> VersioningResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VersioningError::Scheduler(format!("no tokio runtime: {e}")))?;

        let interval = metadata.backup_interval;
        let first = metadata
            .next_backup_at
            .unwrap_or_else(|| Utc::now() + interval_duration(interval));
        self.system.set_next_backup_at(Some(first))?;

        let system = Arc::clone(&self.system);
        let handle = runtime.spawn(run_timer(system, interval, first));

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        *task = Some(handle);
        tracing::debug!(next = %first, "auto-backup timer started");
        Ok(())
    }
}

impl Drop for AutoBackupScheduler {
    fn drop(&mut self) {
        self.stop_auto_backup();
    }
}

/// How often a sleeping timer re-reads the persisted settings
const SETTINGS_POLL: Duration = Duration::from_secs(30);

async fn run_timer(system: Arc<VersioningSystem>, mut interval_minutes: u64, first: DateTime<Utc>) {
    let mut next = first;
    loop {
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait.min(SETTINGS_POLL)).await;

        let worker = Arc::clone(&system);
        if Utc::now() < next {
            // Not due yet: only pick up settings changed by another process
            let Ok(settings) = tokio::task::spawn_blocking(move || worker.metadata()).await else {
                continue;
            };
            match settings {
                Ok(metadata) if !metadata.auto_backup_enabled => break,
                Ok(metadata) if metadata.backup_interval != interval_minutes => {
                    interval_minutes = metadata.backup_interval;
                    next = metadata
                        .next_backup_at
                        .unwrap_or_else(|| Utc::now() + interval_duration(interval_minutes));
                    tracing::debug!(interval_minutes, next = %next, "auto-backup rescheduled");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to read auto-backup settings"),
            }
            continue;
        }

        let tick = tokio::task::spawn_blocking(move || worker.run_scheduled_backup(interval_minutes)).await;
        match tick {
            Ok(Ok(ScheduledBackup::Created { version, next: upcoming })) => {
                tracing::debug!(version = %version.version, next = %upcoming, "auto-backup created");
                next = upcoming;
            }
            Ok(Ok(ScheduledBackup::Rescheduled {
                interval_minutes: minutes,
                next: upcoming,
            })) => {
                tracing::debug!(interval_minutes = minutes, next = %upcoming, "auto-backup rescheduled");
                interval_minutes = minutes;
                next = upcoming;
            }
            Ok(Ok(ScheduledBackup::Disabled)) => break,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "auto-backup failed");
                next = Utc::now() + interval_duration(interval_minutes);
            }
            Err(e) => {
                tracing::warn!(error = %e, "auto-backup task panicked");
                next = Utc::now() + interval_duration(interval_minutes);
            }
        }
    }
    tracing::info!("auto-backup disabled, timer stopped");
}
