//! Version records and backup metadata

use crate::config::VersioningConfig;
use crate::error::{VersioningError, VersioningResult};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description used for timer-driven versions
pub const AUTO_BACKUP_DESCRIPTION: &str = "Sauvegarde automatique";

/// Longest accepted auto-backup interval (one year)
pub const MAX_BACKUP_INTERVAL_MINUTES: u64 = 525_600;

/// An immutable, labeled snapshot with its change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Positional label (`major.minor.patch`)
    pub version: String,
    /// When created
    pub timestamp: DateTime<Utc>,
    /// What triggered this version
    pub description: String,
    /// Captured domain state
    pub data: Snapshot,
    /// Human-readable change log lines
    #[serde(default)]
    pub changes: Vec<String>,
    /// Who created it
    #[serde(default)]
    pub author: String,
    /// Fingerprint of `data`
    pub hash: String,
}

impl Version {
    /// Whether this version was created by the auto-backup timer
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.description == AUTO_BACKUP_DESCRIPTION
    }
}

/// Label for the version created when the registry holds `n` entries
///
/// `major = n / 100 + 1`, `minor = (n % 100) / 10`, `patch = n % 10`.
/// Positional, so labels repeat once older entries have been evicted.
#[must_use]
pub fn version_label(n: usize) -> String {
    let major = n / 100 + 1;
    let minor = (n % 100) / 10;
    let patch = n % 10;
    format!("{major}.{minor}.{patch}")
}

/// Versioning settings and counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    /// Number of stored versions
    pub total_versions: usize,
    /// When the latest version was created
    pub last_backup: Option<DateTime<Utc>>,
    /// Whether the auto-backup timer should run
    pub auto_backup_enabled: bool,
    /// Auto-backup interval in minutes
    pub backup_interval: u64,
    /// Retention cap
    pub max_versions: usize,
    /// Persisted next fire time of the auto-backup timer
    #[serde(default)]
    pub next_backup_at: Option<DateTime<Utc>>,
}

impl BackupMetadata {
    /// First-run metadata built from configuration defaults
    #[must_use]
    pub fn from_config(config: &VersioningConfig) -> Self {
        Self {
            total_versions: 0,
            last_backup: None,
            auto_backup_enabled: config.auto_backup_enabled,
            backup_interval: config.backup_interval_minutes,
            max_versions: config.max_versions,
            next_backup_at: None,
        }
    }
}

/// Reject a retention cap of zero
///
/// # Errors
/// Returns `InvalidConfig` when `max_versions` is 0
pub fn validate_max_versions(max_versions: usize) -> VersioningResult<()> {
    if max_versions == 0 {
        return Err(VersioningError::InvalidConfig(
            "max versions must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Reject a zero or out-of-range auto-backup interval
///
/// # Errors
/// Returns `InvalidConfig` unless `1 <= interval_minutes <= MAX_BACKUP_INTERVAL_MINUTES`
pub fn validate_backup_interval(interval_minutes: u64) -> VersioningResult<()> {
    if interval_minutes == 0 || interval_minutes > MAX_BACKUP_INTERVAL_MINUTES {
        return Err(VersioningError::InvalidConfig(format!(
            "backup interval must be between 1 and {MAX_BACKUP_INTERVAL_MINUTES} minutes"
        )));
    }
    Ok(())
}

impl Default for BackupMetadata {
    fn default() -> Self {
        Self::from_config(&VersioningConfig::default())
    }
}

/// Aggregate statistics about stored versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    pub total_versions: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub automatic_backups: usize,
    pub manual_versions: usize,
    /// Size of the serialized registry
    pub total_size_bytes: usize,
}
