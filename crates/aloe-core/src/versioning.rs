//! Versioning service
//!
//! `VersioningSystem` owns the storage handle and is the only writer of the
//! versioning keys. It is constructed explicitly and shared through `Arc`.
//! Every multi-step operation runs inside one `SQLite` transaction while the
//! connection mutex is held, so the version list, metadata and current
//! pointer are always updated together or not at all.

use crate::config::{resolve_data_dir, VersioningConfig, DATABASE_FILE_NAME};
use crate::error::{VersioningError, VersioningResult};
use crate::hash::fingerprint;
use crate::snapshot::Snapshot;
use crate::storage::{Database, SnapshotStore};
use crate::version::export::{parse_import, render_export};
use crate::version::integrity::{self, IntegrityReport};
use crate::version::registry::{VersionRegistry, CURRENT_VERSION_KEY, METADATA_KEY, VERSIONS_KEY};
use crate::version::{
    validate_backup_interval, validate_max_versions, BackupMetadata, Version, VersionDiff,
    VersionStats, AUTO_BACKUP_DESCRIPTION,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use crate::version::MAX_BACKUP_INTERVAL_MINUTES;

/// Result of a successful restore
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// The version whose data was written back
    pub restored: Version,
    /// The version capturing the state just before the restore
    pub safety: Version,
}

/// What a scheduled auto-backup tick did
#[derive(Debug, Clone)]
pub enum ScheduledBackup {
    /// A version was created; the next tick is due at `next`
    Created { version: Version, next: DateTime<Utc> },
    /// The interval changed since the timer started; nothing was created
    Rescheduled { interval_minutes: u64, next: DateTime<Utc> },
    /// Auto-backup is disabled; the timer should stop
    Disabled,
}

/// Whether a new version may evict old ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retention {
    /// Evict from the front down to `maxVersions`
    Enforce,
    /// Keep every existing entry; the next regular version applies the cap
    Defer,
}

/// Snapshot-based version history over the domain collections
pub struct VersioningSystem {
    db: Mutex<Database>,
    config: VersioningConfig,
}

impl VersioningSystem {
    /// Open (or create) the database in `data_dir`
    ///
    /// # Errors
    /// Returns an error if the directory or database cannot be created
    pub fn open(data_dir: &Path, config: VersioningConfig) -> VersioningResult<Self> {
        fs::create_dir_all(data_dir)?;
        let db = Database::open(&data_dir.join(DATABASE_FILE_NAME))?;
        Self::with_database(db, config)
    }

    /// Resolve the data directory, load its configuration, and open it
    ///
    /// # Errors
    /// Returns an error if the directory cannot be resolved, the
    /// configuration is invalid, or the database cannot be opened
    pub fn open_default(explicit_dir: Option<&Path>) -> VersioningResult<Self> {
        let data_dir = resolve_data_dir(explicit_dir)?;
        let config = VersioningConfig::load(&data_dir)?;
        Self::open(&data_dir, config)
    }

    /// Create a system over an in-memory database (for testing)
    ///
    /// # Errors
    /// Returns an error if the database cannot be created
    pub fn in_memory(config: VersioningConfig) -> VersioningResult<Self> {
        Self::with_database(Database::in_memory()?, config)
    }

    /// Wrap an open database, writing default metadata on first run
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or metadata cannot be written
    pub fn with_database(db: Database, config: VersioningConfig) -> VersioningResult<Self> {
        config.validate()?;
        let system = Self {
            db: Mutex::new(db),
            config,
        };
        system.initialize()?;
        Ok(system)
    }

    fn initialize(&self) -> VersioningResult<()> {
        self.transact(|store| {
            if store.get_raw(METADATA_KEY)?.is_none() {
                let metadata = BackupMetadata::from_config(&self.config);
                store.try_set(METADATA_KEY, &metadata)?;
                tracing::info!("initialized backup metadata");
            }
            Ok(())
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn transact<T>(
        &self,
        op: impl FnOnce(&SnapshotStore<'_>) -> VersioningResult<T>,
    ) -> VersioningResult<T> {
        let mut db = self.lock();
        let tx = db.transaction()?;
        let result = {
            let store = SnapshotStore::new(&tx, &self.config.key_prefix);
            op(&store)?
        };
        tx.commit()?;
        Ok(result)
    }

    /// Run a closure against the live store (domain keys included)
    pub fn with_store<T>(&self, op: impl FnOnce(&SnapshotStore<'_>) -> T) -> T {
        let db = self.lock();
        let store = SnapshotStore::new(db.connection(), &self.config.key_prefix);
        op(&store)
    }

    /// Capture the live domain state
    #[must_use]
    pub fn capture_snapshot(&self) -> Snapshot {
        self.with_store(|store| Snapshot::capture(store))
    }

    /// Create a version of the live domain state
    ///
    /// `author` defaults to the configured default author.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be hashed or any write fails;
    /// nothing is persisted in that case
    pub fn create_version(
        &self,
        description: &str,
        changes: Vec<String>,
        author: Option<&str>,
    ) -> VersioningResult<Version> {
        let author = author.unwrap_or(&self.config.default_author);
        self.transact(|store| {
            self.create_version_in(store, description, changes, author, Retention::Enforce)
        })
        .map_err(|e| {
            tracing::error!(error = %e, description, "failed to create version");
            e
        })
    }

    pub(crate) fn create_version_in(
        &self,
        store: &SnapshotStore<'_>,
        description: &str,
        changes: Vec<String>,
        author: &str,
        retention: Retention,
    ) -> VersioningResult<Version> {
        let snapshot = Snapshot::capture(store);
        let hash = fingerprint(&snapshot)?;

        let mut registry = VersionRegistry::load(store)?;
        let mut metadata = self.load_metadata(store)?;

        let version = Version {
            version: registry.next_label(),
            timestamp: Utc::now(),
            description: description.to_string(),
            data: snapshot,
            changes,
            author: author.to_string(),
            hash,
        };

        let cap = match retention {
            Retention::Enforce => metadata.max_versions,
            Retention::Defer => metadata.max_versions.max(registry.len() + 1),
        };
        let evicted = registry.push(version.clone(), cap);
        registry.save(store)?;

        metadata.total_versions = registry.len();
        metadata.last_backup = Some(version.timestamp);
        store.try_set(METADATA_KEY, &metadata)?;
        store.try_set(CURRENT_VERSION_KEY, &version.version)?;

        tracing::info!(
            version = %version.version,
            description,
            evicted = evicted.len(),
            "created version"
        );
        Ok(version)
    }

    fn load_metadata(&self, store: &SnapshotStore<'_>) -> VersioningResult<BackupMetadata> {
        Ok(store
            .try_get(METADATA_KEY)?
            .unwrap_or_else(|| BackupMetadata::from_config(&self.config)))
    }

    /// All stored versions, oldest first
    ///
    /// # Errors
    /// Returns an error if the stored list cannot be read
    pub fn versions(&self) -> VersioningResult<Vec<Version>> {
        self.with_store(|store| Ok(VersionRegistry::load(store)?.into_vec()))
    }

    /// First version with the given label
    ///
    /// # Errors
    /// Returns an error if the stored list cannot be read
    pub fn version(&self, label: &str) -> VersioningResult<Option<Version>> {
        self.with_store(|store| Ok(VersionRegistry::load(store)?.find(label).cloned()))
    }

    /// Label the current version pointer refers to
    #[must_use]
    pub fn current_version(&self) -> Option<String> {
        self.with_store(|store| store.get(CURRENT_VERSION_KEY))
    }

    /// Current backup metadata
    ///
    /// # Errors
    /// Returns an error if the stored metadata cannot be read
    pub fn metadata(&self) -> VersioningResult<BackupMetadata> {
        self.with_store(|store| self.load_metadata(store))
    }

    /// Aggregate statistics
    ///
    /// # Errors
    /// Returns an error if the stored list cannot be read
    pub fn stats(&self) -> VersioningResult<VersionStats> {
        self.with_store(|store| Ok(VersionRegistry::load(store)?.stats()))
    }

    /// Delete the first version with the given label
    ///
    /// # Errors
    /// Returns `NotFound` if no version has that label
    pub fn delete_version(&self, label: &str) -> VersioningResult<Version> {
        self.transact(|store| {
            let mut registry = VersionRegistry::load(store)?;
            let removed = registry
                .remove(label)
                .ok_or_else(|| VersioningError::not_found(label))?;
            self.save_registry(store, &registry)?;
            tracing::info!(version = label, "deleted version");
            Ok(removed)
        })
    }

    /// Keep only the newest `keep` versions; returns how many were deleted
    ///
    /// # Errors
    /// Returns an error if the registry cannot be read or written
    pub fn cleanup_old_versions(&self, keep: usize) -> VersioningResult<usize> {
        self.transact(|store| {
            let mut registry = VersionRegistry::load(store)?;
            let deleted = registry.retain_newest(keep);
            if deleted > 0 {
                self.save_registry(store, &registry)?;
            }
            tracing::info!(keep, deleted, "cleaned up old versions");
            Ok(deleted)
        })
    }

    fn save_registry(
        &self,
        store: &SnapshotStore<'_>,
        registry: &VersionRegistry,
    ) -> VersioningResult<()> {
        registry.save(store)?;
        let mut metadata = self.load_metadata(store)?;
        metadata.total_versions = registry.len();
        store.try_set(METADATA_KEY, &metadata)?;
        Ok(())
    }

    /// Change the retention cap and apply it immediately
    ///
    /// Returns how many versions were evicted.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero cap
    pub fn set_max_versions(&self, max_versions: usize) -> VersioningResult<usize> {
        validate_max_versions(max_versions)?;
        if !(10..=200).contains(&max_versions) {
            tracing::warn!(max_versions, "retention cap outside the usual 10-200 range");
        }

        self.transact(|store| {
            let mut registry = VersionRegistry::load(store)?;
            let evicted = registry.enforce_cap(max_versions).len();
            registry.save(store)?;

            let mut metadata = self.load_metadata(store)?;
            metadata.max_versions = max_versions;
            metadata.total_versions = registry.len();
            store.try_set(METADATA_KEY, &metadata)?;
            Ok(evicted)
        })
    }

    /// Persist auto-backup settings
    ///
    /// Disabling clears the persisted next fire time.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero or out-of-range interval
    pub fn set_auto_backup(
        &self,
        enabled: bool,
        interval_minutes: u64,
    ) -> VersioningResult<BackupMetadata> {
        validate_backup_interval(interval_minutes)?;
        if !(5..=1440).contains(&interval_minutes) {
            tracing::warn!(interval_minutes, "backup interval outside the usual 5-1440 range");
        }

        self.transact(|store| {
            let mut metadata = self.load_metadata(store)?;
            if metadata.backup_interval != interval_minutes {
                metadata.next_backup_at = None;
            }
            metadata.auto_backup_enabled = enabled;
            metadata.backup_interval = interval_minutes;
            if !enabled {
                metadata.next_backup_at = None;
            }
            store.try_set(METADATA_KEY, &metadata)?;
            Ok(metadata)
        })
    }

    /// Persist the next auto-backup fire time
    ///
    /// # Errors
    /// Returns an error if metadata cannot be written
    pub fn set_next_backup_at(&self, at: Option<DateTime<Utc>>) -> VersioningResult<()> {
        self.transact(|store| {
            let mut metadata = self.load_metadata(store)?;
            metadata.next_backup_at = at;
            store.try_set(METADATA_KEY, &metadata)?;
            Ok(())
        })
    }

    /// Run one auto-backup tick against the persisted settings
    ///
    /// The settings are re-read under the same transaction that creates the
    /// version and persists the next fire time, so a concurrent disable
    /// (from another process) is never overwritten.
    ///
    /// # Errors
    /// Returns an error if metadata cannot be read or the version cannot be
    /// created; nothing is persisted in that case
    pub fn run_scheduled_backup(&self, interval_minutes: u64) -> VersioningResult<ScheduledBackup> {
        self.transact(|store| {
            let mut metadata = self.load_metadata(store)?;
            let usable = validate_backup_interval(metadata.backup_interval).is_ok();
            if !metadata.auto_backup_enabled || !usable {
                return Ok(ScheduledBackup::Disabled);
            }

            let now = Utc::now();
            if metadata.backup_interval != interval_minutes {
                let next = metadata
                    .next_backup_at
                    .filter(|at| *at > now)
                    .unwrap_or_else(|| now + interval_duration(metadata.backup_interval));
                metadata.next_backup_at = Some(next);
                store.try_set(METADATA_KEY, &metadata)?;
                return Ok(ScheduledBackup::Rescheduled {
                    interval_minutes: metadata.backup_interval,
                    next,
                });
            }

            let version = self.create_version_in(
                store,
                AUTO_BACKUP_DESCRIPTION,
                Vec::new(),
                &self.config.default_author,
                Retention::Enforce,
            )?;

            // Missed ticks collapse into one: the next fire time counts from now
            let next = Utc::now() + interval_duration(interval_minutes);
            let mut metadata = self.load_metadata(store)?;
            metadata.next_backup_at = Some(next);
            store.try_set(METADATA_KEY, &metadata)?;
            Ok(ScheduledBackup::Created { version, next })
        })
    }

    /// Restore the domain keys from a version
    ///
    /// A safety version of the current state is created first. The safety
    /// version, the data writes, and the pointer update commit together.
    /// Callers should reload any state derived from the domain keys.
    ///
    /// # Errors
    /// Returns `NotFound` if no version has that label, or a storage error;
    /// storage is unchanged in both cases
    pub fn restore_version(&self, label: &str) -> VersioningResult<RestoreOutcome> {
        let outcome = self.transact(|store| {
            let target = VersionRegistry::load(store)?
                .find(label)
                .cloned()
                .ok_or_else(|| VersioningError::not_found(label))?;

            let safety = self.create_version_in(
                store,
                &format!("Sauvegarde avant restauration vers {label}"),
                vec![format!("Restauration de la version {label}")],
                &self.config.default_author,
                Retention::Enforce,
            )?;

            target.data.apply(store)?;
            store.try_set(CURRENT_VERSION_KEY, label)?;

            Ok(RestoreOutcome {
                restored: target,
                safety,
            })
        });

        match &outcome {
            Ok(o) => tracing::info!(
                version = label,
                safety = %o.safety.version,
                "restored version"
            ),
            Err(e) => tracing::warn!(version = label, error = %e, "restore failed"),
        }
        outcome
    }

    /// Serialize the registry and metadata to an export document
    ///
    /// # Errors
    /// Returns an error if the registry cannot be read
    pub fn export_versions(&self) -> VersioningResult<String> {
        self.with_store(|store| {
            let registry = VersionRegistry::load(store)?;
            let metadata = self.load_metadata(store)?;
            render_export(&metadata, registry.as_slice(), &self.config.app_name)
        })
    }

    /// Write an export document to a file
    ///
    /// # Errors
    /// Returns an error if the export or the write fails
    pub fn export_to_file(&self, path: &Path) -> VersioningResult<()> {
        let json = self.export_versions()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Replace the registry with an exported history
    ///
    /// The imported list (and metadata, when present) replaces the current
    /// one wholesale, then a safety version of the live state is appended.
    /// The safety version never evicts an imported entry: a full history
    /// is kept whole plus one, and the next regular version applies the cap.
    /// Returns the number of imported versions.
    ///
    /// # Errors
    /// Returns `InvalidImport` for a malformed document; storage is unchanged
    pub fn import_versions(&self, json: &str) -> VersioningResult<usize> {
        let imported = parse_import(json).map_err(|e| {
            tracing::warn!(error = %e, "rejected import");
            e
        })?;
        let count = imported.versions.len();

        self.transact(|store| {
            let mut metadata = match imported.metadata {
                Some(metadata) => metadata,
                None => self.load_metadata(store)?,
            };
            let registry = VersionRegistry::from_versions(imported.versions);
            metadata.total_versions = registry.len();
            registry.save(store)?;
            store.try_set(METADATA_KEY, &metadata)?;

            self.create_version_in(
                store,
                "Sauvegarde avant import",
                vec![format!("Import de {count} version(s)")],
                &self.config.default_author,
                Retention::Defer,
            )?;
            Ok(())
        })?;

        tracing::info!(count, "imported versions");
        Ok(count)
    }

    /// Import an export document from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the import fails
    pub fn import_from_file(&self, path: &Path) -> VersioningResult<usize> {
        let json = fs::read_to_string(path)?;
        self.import_versions(&json)
    }

    fn check_in(store: &SnapshotStore<'_>) -> VersioningResult<(IntegrityReport, Option<Vec<Value>>)> {
        let metadata: Option<Value> = match store.get_raw(METADATA_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw).unwrap_or(Value::Null)),
            None => None,
        };

        let versions = match store.get_raw(VERSIONS_KEY)? {
            None => Some(Vec::new()),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(entries)) => Some(entries),
                _ => None,
            },
        };

        let report = match &versions {
            Some(entries) => integrity::check(entries, metadata.as_ref()),
            None => {
                let mut report = integrity::check(&[], metadata.as_ref());
                report.valid = false;
                report.errors.insert(0, "Version list is unreadable".to_string());
                report
            }
        };
        Ok((report, versions))
    }

    /// Verify stored hashes, required fields, and metadata
    ///
    /// # Errors
    /// Returns an error only if storage cannot be queried
    pub fn check_integrity(&self) -> VersioningResult<IntegrityReport> {
        let (report, _) = self.with_store(Self::check_in)?;
        if !report.valid {
            tracing::warn!(errors = report.errors.len(), "integrity check failed");
        }
        Ok(report)
    }

    /// Heal hash mismatches and metadata counters
    ///
    /// Returns whether the registry is valid afterwards. Versions that lost
    /// their data cannot be repaired and keep the result `false`.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read or written
    pub fn repair_data(&self) -> VersioningResult<bool> {
        self.transact(|store| {
            let (report, versions) = Self::check_in(store)?;
            if report.valid {
                return Ok(true);
            }
            let Some(mut versions) = versions else {
                tracing::warn!("version list is unreadable, nothing to repair");
                return Ok(false);
            };

            let repaired = integrity::repair_hashes(&mut versions);
            store.try_set(VERSIONS_KEY, &versions)?;

            let mut metadata = store
                .try_get::<BackupMetadata>(METADATA_KEY)
                .ok()
                .flatten()
                .unwrap_or_else(|| BackupMetadata::from_config(&self.config));
            metadata.total_versions = versions.len();
            store.try_set(METADATA_KEY, &metadata)?;

            let (after, _) = Self::check_in(store)?;
            tracing::info!(repaired, valid = after.valid, "repaired version data");
            Ok(after.valid)
        })
    }

    /// Compare two versions by label
    ///
    /// # Errors
    /// Returns `NotFound` if either label is unknown
    pub fn compare_versions(&self, from: &str, to: &str) -> VersioningResult<VersionDiff> {
        self.with_store(|store| {
            let registry = VersionRegistry::load(store)?;
            let a = registry
                .find(from)
                .ok_or_else(|| VersioningError::not_found(from))?;
            let b = registry
                .find(to)
                .ok_or_else(|| VersioningError::not_found(to))?;
            Ok(VersionDiff::between(a, b))
        })
    }
}

/// Interval in minutes as a chrono duration, clamped to the accepted range
pub(crate) fn interval_duration(minutes: u64) -> Duration {
    let minutes = i64::try_from(minutes.min(MAX_BACKUP_INTERVAL_MINUTES)).unwrap_or_default();
    Duration::minutes(minutes)
}
