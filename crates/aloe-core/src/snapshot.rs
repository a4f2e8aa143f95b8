//! Snapshot capture and apply
//!
//! A snapshot bundles the domain collections stored in the key-value
//! substrate. Domain records stay opaque JSON so whatever fields the CRUD
//! application writes survive capture and restore unchanged.
//!
//! Passwords are never captured. The snapshot only records a SHA-256 digest
//! per user so credential changes still show up in the fingerprint.

use crate::storage::db::DatabaseError;
use crate::storage::SnapshotStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Domain keys held in the storage substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainKey {
    Users,
    Passwords,
    InsuranceTypes,
    Sales,
    Objectives,
    Settings,
}

impl DomainKey {
    /// Keys whose content is captured into snapshots and written on restore
    pub const SNAPSHOT_KEYS: [DomainKey; 5] = [
        DomainKey::Users,
        DomainKey::InsuranceTypes,
        DomainKey::Sales,
        DomainKey::Objectives,
        DomainKey::Settings,
    ];

    /// Storage key name (without prefix)
    #[must_use]
    pub fn storage_name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Passwords => "passwords",
            Self::InsuranceTypes => "insurance_types",
            Self::Sales => "sales",
            Self::Objectives => "objectives",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_name())
    }
}

/// Point-in-time copy of the domain collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub insurance_types: Vec<Value>,
    #[serde(default)]
    pub sales: Vec<Value>,
    #[serde(default)]
    pub objectives: Vec<Value>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    /// username -> hex SHA-256 of `username:secret`
    #[serde(default)]
    pub credential_digests: BTreeMap<String, String>,
}

impl Snapshot {
    /// Capture the current domain state, using empty defaults for missing keys
    #[must_use]
    pub fn capture(store: &SnapshotStore<'_>) -> Self {
        let collection = |key: DomainKey| -> Vec<Value> {
            store.get(key.storage_name()).unwrap_or_default()
        };

        let passwords: BTreeMap<String, String> = store
            .get(DomainKey::Passwords.storage_name())
            .unwrap_or_default();

        Self {
            users: collection(DomainKey::Users),
            insurance_types: collection(DomainKey::InsuranceTypes),
            sales: collection(DomainKey::Sales),
            objectives: collection(DomainKey::Objectives),
            settings: store
                .get(DomainKey::Settings.storage_name())
                .unwrap_or_default(),
            credential_digests: passwords
                .iter()
                .map(|(user, secret)| (user.clone(), credential_digest(user, secret)))
                .collect(),
        }
    }

    /// Write every snapshot key back to storage
    ///
    /// The live `passwords` key is left untouched.
    ///
    /// # Errors
    /// Returns an error on the first failed write
    pub fn apply(&self, store: &SnapshotStore<'_>) -> Result<(), DatabaseError> {
        for key in DomainKey::SNAPSHOT_KEYS {
            match key {
                DomainKey::Settings => store.try_set(key.storage_name(), &self.settings)?,
                _ => {
                    let items = self.collection(key).unwrap_or_default();
                    store.try_set(key.storage_name(), items)?;
                }
            }
        }
        Ok(())
    }

    /// Borrow a list collection by key (`None` for settings and passwords)
    #[must_use]
    pub fn collection(&self, key: DomainKey) -> Option<&[Value]> {
        match key {
            DomainKey::Users => Some(&self.users),
            DomainKey::InsuranceTypes => Some(&self.insurance_types),
            DomainKey::Sales => Some(&self.sales),
            DomainKey::Objectives => Some(&self.objectives),
            DomainKey::Settings | DomainKey::Passwords => None,
        }
    }

    /// Total number of records across list collections
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.users.len() + self.insurance_types.len() + self.sales.len() + self.objectives.len()
    }
}

/// Non-reversible digest of a credential
#[must_use]
pub fn credential_digest(username: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
