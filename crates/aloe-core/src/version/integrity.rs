//! Integrity checking and hash repair
//!
//! Checks run on the raw stored JSON rather than typed versions, so entries
//! that lost a field can still be reported instead of failing to load.

use crate::hash::fingerprint;
use crate::version::types::BackupMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields every stored version must carry
pub const REQUIRED_FIELDS: [&str; 4] = ["version", "timestamp", "data", "hash"];

/// Result of an integrity check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

fn entry_label(index: usize, entry: &Value) -> String {
    entry
        .get("version")
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{index}"), ToString::to_string)
}

/// Check stored versions and metadata
#[must_use]
pub fn check(versions: &[Value], metadata: Option<&Value>) -> IntegrityReport {
    let mut errors = Vec::new();

    match metadata {
        None => errors.push("Backup metadata is missing".to_string()),
        Some(raw) => match serde_json::from_value::<BackupMetadata>(raw.clone()) {
            Ok(metadata) if metadata.total_versions != versions.len() => errors.push(format!(
                "Metadata reports {} versions but {} are stored",
                metadata.total_versions,
                versions.len()
            )),
            Ok(_) => {}
            Err(e) => errors.push(format!("Backup metadata is unreadable: {e}")),
        },
    }

    for (index, entry) in versions.iter().enumerate() {
        let label = entry_label(index, entry);

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| entry.get(field).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "Version {label} is missing required fields: {}",
                missing.join(", ")
            ));
            continue;
        }

        let stored = entry.get("hash").and_then(Value::as_str).unwrap_or_default();
        match entry.get("data").map(fingerprint) {
            Some(Ok(computed)) if computed != stored => errors.push(format!(
                "Version {label} has a hash mismatch (stored {stored}, computed {computed})"
            )),
            Some(Err(e)) => errors.push(format!("Version {label} data cannot be hashed: {e}")),
            _ => {}
        }
    }

    IntegrityReport::from_errors(errors)
}

/// Recompute the hash of every entry that still has data
///
/// Returns the number of hashes that changed. Entries without data are
/// left as they are.
pub fn repair_hashes(versions: &mut [Value]) -> usize {
    let mut repaired = 0;
    for entry in versions.iter_mut() {
        let Some(data) = entry.get("data").filter(|d| !d.is_null()) else {
            continue;
        };
        let Ok(computed) = fingerprint(data) else {
            continue;
        };
        let Some(object) = entry.as_object_mut() else {
            continue;
        };
        if object.get("hash").and_then(Value::as_str) != Some(computed.as_str()) {
            object.insert("hash".to_string(), Value::String(computed));
            repaired += 1;
        }
    }
    repaired
}
