//! Domain write path with automatic versioning
//!
//! The CRUD application writes collections through `DataManager`, which then
//! decides whether the change deserves a version:
//!
//! - a write that leaves the snapshot fingerprint equal to the latest
//!   version's hash never creates one;
//! - creations, deletions and imports always do;
//! - updates do only when the latest version is older than the coalesce
//!   window, so a burst of edits produces a single version.
//!
//! The write, the significance check and the version creation run in one
//! transaction: an auto-backup tick cannot land in between, and a failed
//! version creation rolls the write back.

use crate::error::{VersioningError, VersioningResult};
use crate::hash::fingerprint;
use crate::snapshot::{DomainKey, Snapshot};
use crate::version::{Version, VersionRegistry};
use crate::versioning::{Retention, VersioningSystem};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Kind of domain change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Import,
}

/// A domain change reported by the CRUD layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Version description, e.g. "Création vente"
    pub description: String,
    /// Change log line, e.g. "Vente #42 ajoutée pour Dupont"
    pub summary: String,
    /// Who made the change
    pub author: Option<String>,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(kind: ChangeKind, description: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            summary: summary.into(),
            author: None,
        }
    }

    /// Set the author of this change
    #[must_use]
    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Writes domain collections and versions significant changes
pub struct DataManager {
    system: Arc<VersioningSystem>,
    coalesce_window: Duration,
}

impl DataManager {
    /// Create a manager with an explicit coalesce window
    #[must_use]
    pub fn new(system: Arc<VersioningSystem>, coalesce_window: Duration) -> Self {
        Self {
            system,
            coalesce_window,
        }
    }

    /// Create a manager using the configured coalesce window
    #[must_use]
    pub fn from_config(system: Arc<VersioningSystem>) -> Self {
        let window = Duration::from_secs(system.config().update_coalesce_secs);
        Self::new(system, window)
    }

    /// The underlying versioning system
    #[must_use]
    pub fn system(&self) -> &Arc<VersioningSystem> {
        &self.system
    }

    /// Load a list collection (empty when missing or unreadable)
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, key: DomainKey) -> Vec<T> {
        self.system
            .with_store(|store| store.get::<Vec<T>>(key.storage_name()))
            .unwrap_or_default()
    }

    /// Load the settings object
    #[must_use]
    pub fn load_settings(&self) -> Map<String, Value> {
        self.system
            .with_store(|store| store.get::<Map<String, Value>>(DomainKey::Settings.storage_name()))
            .unwrap_or_default()
    }

    /// Write a list collection, then version it if significant
    ///
    /// # Errors
    /// Returns `InvalidConfig` for the passwords or settings keys, or an
    /// error if the write or the version creation fails
    pub fn save<T: Serialize>(
        &self,
        key: DomainKey,
        items: &[T],
        event: &ChangeEvent,
    ) -> VersioningResult<Option<Version>> {
        if matches!(key, DomainKey::Passwords | DomainKey::Settings) {
            return Err(VersioningError::InvalidConfig(format!(
                "'{key}' is not a list collection"
            )));
        }
        self.write_and_version(key, items, event)
    }

    /// Write the settings object, then version it if significant
    ///
    /// # Errors
    /// Returns an error if the write or the version creation fails
    pub fn save_settings(
        &self,
        settings: &Map<String, Value>,
        event: &ChangeEvent,
    ) -> VersioningResult<Option<Version>> {
        self.write_and_version(DomainKey::Settings, settings, event)
    }

    /// Set a user's password in the live store
    ///
    /// Versions only ever see a digest of it.
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub fn set_password(&self, username: &str, secret: &str) -> VersioningResult<()> {
        self.system.transact(|store| {
            let key = DomainKey::Passwords.storage_name();
            let mut passwords: BTreeMap<String, String> = store.get(key).unwrap_or_default();
            passwords.insert(username.to_string(), secret.to_string());
            store.try_set(key, &passwords)?;
            Ok(())
        })
    }

    fn write_and_version<T: Serialize + ?Sized>(
        &self,
        key: DomainKey,
        value: &T,
        event: &ChangeEvent,
    ) -> VersioningResult<Option<Version>> {
        let author = event
            .author
            .as_deref()
            .unwrap_or(&self.system.config().default_author);

        self.system.transact(|store| {
            store.try_set(key.storage_name(), value)?;
            tracing::debug!(key = %key, "domain collection written");

            let registry = VersionRegistry::load(store)?;
            let live_hash = fingerprint(&Snapshot::capture(store))?;
            if !is_significant(event.kind, registry.latest(), &live_hash, self.coalesce_window) {
                tracing::debug!(description = %event.description, "change not significant, no version");
                return Ok(None);
            }

            let version = self.system.create_version_in(
                store,
                &event.description,
                vec![event.summary.clone()],
                author,
                Retention::Enforce,
            )?;
            Ok(Some(version))
        })
    }
}

fn is_significant(
    kind: ChangeKind,
    latest: Option<&Version>,
    live_hash: &str,
    coalesce_window: Duration,
) -> bool {
    let Some(latest) = latest else {
        return true;
    };
    if latest.hash == live_hash {
        return false;
    }
    match kind {
        ChangeKind::Create | ChangeKind::Delete | ChangeKind::Import => true,
        ChangeKind::Update => {
            let age = (Utc::now() - latest.timestamp)
                .to_std()
                .unwrap_or(Duration::ZERO);
            age >= coalesce_window
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;

    fn latest(hash: &str, age_secs: i64) -> Version {
        Version {
            version: "1.0.0".to_string(),
            timestamp: Utc::now() - chrono::Duration::seconds(age_secs),
            description: String::new(),
            data: Snapshot::default(),
            changes: Vec::new(),
            author: "System".to_string(),
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_failed_version_rolls_back_write() {
        use crate::config::VersioningConfig;
        use crate::version::registry::VERSIONS_KEY;
        use serde_json::json;

        let system = Arc::new(VersioningSystem::in_memory(VersioningConfig::default()).unwrap());
        let manager = DataManager::new(Arc::clone(&system), Duration::ZERO);
        let create = ChangeEvent::new(ChangeKind::Create, "Création vente", "s1");
        manager.save(DomainKey::Sales, &[json!({"id": "s1"})], &create).unwrap();

        system.with_store(|store| store.set_raw(VERSIONS_KEY, "{broken").unwrap());
        let delete = ChangeEvent::new(ChangeKind::Delete, "Suppression vente", "s1");
        assert!(manager.save::<Value>(DomainKey::Sales, &[], &delete).is_err());

        assert_eq!(manager.load::<Value>(DomainKey::Sales), vec![json!({"id": "s1"})]);
    }

    #[test]
    fn test_first_change_is_significant() {
        assert!(is_significant(ChangeKind::Update, None, "abc", Duration::from_secs(60)));
    }

    #[test]
    fn test_unchanged_state_is_not_significant() {
        let v = latest("abc", 3600);
        assert!(!is_significant(ChangeKind::Create, Some(&v), "abc", Duration::from_secs(60)));
    }

    #[test]
    fn test_updates_coalesce_within_window() {
        let recent = latest("abc", 5);
        let old = latest("abc", 120);
        let window = Duration::from_secs(60);
        assert!(!is_significant(ChangeKind::Update, Some(&recent), "def", window));
        assert!(is_significant(ChangeKind::Update, Some(&old), "def", window));
        assert!(is_significant(ChangeKind::Delete, Some(&recent), "def", window));
    }
}
