//! Aloe Core - Versioning engine, storage, and auto-backup
//!
//! This crate provides snapshot-based version history for the Aloe Location
//! domain collections: capture, retention, restore, import/export,
//! integrity checking, and the periodic auto-backup scheduler.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod data_manager;
pub mod error;
pub mod hash;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod version;
pub mod versioning;

pub use config::VersioningConfig;
pub use data_manager::{ChangeEvent, ChangeKind, DataManager};
pub use error::{VersioningError, VersioningResult};
pub use scheduler::{AutoBackupScheduler, SchedulerState};
pub use snapshot::{DomainKey, Snapshot};
pub use version::{BackupMetadata, IntegrityReport, Version, VersionDiff, VersionStats};
pub use versioning::{RestoreOutcome, ScheduledBackup, VersioningSystem};
