//! Comparison of two versions

use crate::snapshot::DomainKey;
use crate::version::types::Version;
use serde::{Deserialize, Serialize};

/// Differences between two versions, per domain collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDiff {
    /// Older side of the comparison
    pub from: String,
    /// Newer side of the comparison
    pub to: String,
    /// One entry per list collection
    pub collections: Vec<CollectionChange>,
    /// Settings keys present only in `to`
    pub settings_added: Vec<String>,
    /// Settings keys present only in `from`
    pub settings_removed: Vec<String>,
    /// Settings keys whose value differs
    pub settings_changed: Vec<String>,
    /// Whether any credential digest was added, removed, or changed
    pub credentials_changed: bool,
}

/// Change summary for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChange {
    pub key: String,
    pub before: usize,
    pub after: usize,
    /// Content differs (even when the count is the same)
    pub changed: bool,
}

impl VersionDiff {
    /// Compare two versions
    #[must_use]
    pub fn between(from: &Version, to: &Version) -> Self {
        let collections = DomainKey::SNAPSHOT_KEYS
            .iter()
            .filter_map(|&key| {
                let before = from.data.collection(key)?;
                let after = to.data.collection(key)?;
                Some(CollectionChange {
                    key: key.storage_name().to_string(),
                    before: before.len(),
                    after: after.len(),
                    changed: before != after,
                })
            })
            .collect();

        let old = &from.data.settings;
        let new = &to.data.settings;
        let settings_added = new.keys().filter(|k| !old.contains_key(*k)).cloned().collect();
        let settings_removed = old.keys().filter(|k| !new.contains_key(*k)).cloned().collect();
        let settings_changed = old
            .iter()
            .filter(|(k, v)| new.get(*k).is_some_and(|nv| nv != *v))
            .map(|(k, _)| k.clone())
            .collect();

        Self {
            from: from.version.clone(),
            to: to.version.clone(),
            collections,
            settings_added,
            settings_removed,
            settings_changed,
            credentials_changed: from.data.credential_digests != to.data.credential_digests,
        }
    }

    /// Check if the two versions hold identical data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.iter().all(|c| !c.changed)
            && self.settings_added.is_empty()
            && self.settings_removed.is_empty()
            && self.settings_changed.is_empty()
            && !self.credentials_changed
    }

    /// One-line summary for terminal output
    #[must_use]
    pub fn one_line(&self) -> String {
        if self.is_empty() {
            return "no differences".to_string();
        }

        let mut parts: Vec<String> = self
            .collections
            .iter()
            .filter(|c| c.changed)
            .map(|c| format!("{} {} -> {}", c.key, c.before, c.after))
            .collect();

        let settings = self.settings_added.len()
            + self.settings_removed.len()
            + self.settings_changed.len();
        if settings > 0 {
            parts.push(format!("{settings} setting(s)"));
        }
        if self.credentials_changed {
            parts.push("credentials".to_string());
        }
        parts.join(", ")
    }
}
