//! Ordered version registry with retention

use crate::storage::db::DatabaseError;
use crate::storage::SnapshotStore;
use crate::version::types::{version_label, Version, VersionStats};

/// Storage key of the version list
pub const VERSIONS_KEY: &str = "versions";
/// Storage key of the backup metadata
pub const METADATA_KEY: &str = "backup_metadata";
/// Storage key of the current version pointer
pub const CURRENT_VERSION_KEY: &str = "current_version";

/// Versions in chronological order (oldest first)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionRegistry {
    versions: Vec<Version>,
}

impl VersionRegistry {
    /// Wrap an existing list
    #[must_use]
    pub fn from_versions(versions: Vec<Version>) -> Self {
        Self { versions }
    }

    /// Load the registry from storage (empty when absent)
    ///
    /// # Errors
    /// Returns an error if the stored list cannot be read or parsed
    pub fn load(store: &SnapshotStore<'_>) -> Result<Self, DatabaseError> {
        let versions = store.try_get(VERSIONS_KEY)?.unwrap_or_default();
        Ok(Self { versions })
    }

    /// Persist the registry
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub fn save(&self, store: &SnapshotStore<'_>) -> Result<(), DatabaseError> {
        store.try_set(VERSIONS_KEY, &self.versions)
    }

    /// Label the next appended version will receive
    #[must_use]
    pub fn next_label(&self) -> String {
        version_label(self.versions.len())
    }

    /// Append a version, then evict from the front down to `max_versions`
    ///
    /// Returns the evicted versions, oldest first.
    pub fn push(&mut self, version: Version, max_versions: usize) -> Vec<Version> {
        self.versions.push(version);
        self.enforce_cap(max_versions)
    }

    /// Evict the oldest entries until at most `max_versions` remain
    pub fn enforce_cap(&mut self, max_versions: usize) -> Vec<Version> {
        if self.versions.len() <= max_versions {
            return Vec::new();
        }
        let excess = self.versions.len() - max_versions;
        self.versions.drain(..excess).collect()
    }

    /// Keep only the newest `keep` versions; returns how many were deleted
    pub fn retain_newest(&mut self, keep: usize) -> usize {
        self.enforce_cap(keep).len()
    }

    /// First version with an exact label match
    #[must_use]
    pub fn find(&self, label: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.version == label)
    }

    /// Remove the first version with an exact label match
    pub fn remove(&mut self, label: &str) -> Option<Version> {
        let index = self.versions.iter().position(|v| v.version == label)?;
        Some(self.versions.remove(index))
    }

    /// Most recently created version
    #[must_use]
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Version] {
        &self.versions
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Version> {
        self.versions
    }

    /// Aggregate statistics
    #[must_use]
    pub fn stats(&self) -> VersionStats {
        let automatic_backups = self.versions.iter().filter(|v| v.is_automatic()).count();
        let total_size_bytes = serde_json::to_string(&self.versions)
            .map(|json| json.len())
            .unwrap_or(0);

        VersionStats {
            total_versions: self.versions.len(),
            oldest: self.versions.first().map(|v| v.timestamp),
            newest: self.versions.last().map(|v| v.timestamp),
            automatic_backups,
            manual_versions: self.versions.len() - automatic_backups,
            total_size_bytes,
        }
    }
}
