//! Version records, registry, import/export, integrity, and comparison

pub mod diff;
pub mod export;
pub mod integrity;
pub mod registry;
pub mod types;

pub use diff::{CollectionChange, VersionDiff};
pub use export::{ImportedHistory, VersionExport};
pub use integrity::IntegrityReport;
pub use registry::VersionRegistry;
pub use types::{
    validate_backup_interval, validate_max_versions, version_label, BackupMetadata, Version,
    VersionStats, AUTO_BACKUP_DESCRIPTION, MAX_BACKUP_INTERVAL_MINUTES,
};
