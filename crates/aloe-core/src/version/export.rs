//! Version history export/import document
//!
//! The export document is pretty-printed JSON:
//! `{ metadata, versions, exportDate, appName }`.

use crate::error::{VersioningError, VersioningResult};
use crate::version::types::{
    validate_backup_interval, validate_max_versions, BackupMetadata, Version,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exported version history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionExport {
    pub metadata: BackupMetadata,
    pub versions: Vec<Version>,
    pub export_date: DateTime<Utc>,
    pub app_name: String,
}

/// Contents accepted from an import document
#[derive(Debug, Clone)]
pub struct ImportedHistory {
    /// Metadata, when the document carried a readable one
    pub metadata: Option<BackupMetadata>,
    pub versions: Vec<Version>,
}

/// Render an export document
///
/// # Errors
/// Returns an error if serialization fails
pub fn render_export(
    metadata: &BackupMetadata,
    versions: &[Version],
    app_name: &str,
) -> VersioningResult<String> {
    let export = VersionExport {
        metadata: metadata.clone(),
        versions: versions.to_vec(),
        export_date: Utc::now(),
        app_name: app_name.to_string(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Parse an import document
///
/// Only `versions` is required, and it must be an array. Every entry has to
/// read as a version; the first one that does not rejects the document.
/// Hashes are not verified here.
///
/// Readable metadata must carry settings the setters would accept.
///
/// # Errors
/// Returns `InvalidImport` for unparsable JSON, a missing or non-array
/// `versions` field, a malformed entry, or out-of-range metadata settings
pub fn parse_import(json: &str) -> VersioningResult<ImportedHistory> {
    let document: Value = serde_json::from_str(json)
        .map_err(|e| VersioningError::InvalidImport(format!("not valid JSON: {e}")))?;

    let entries = document
        .get("versions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            VersioningError::InvalidImport("missing 'versions' array".to_string())
        })?;

    let mut versions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let version: Version = serde_json::from_value(entry.clone()).map_err(|e| {
            VersioningError::InvalidImport(format!("version at index {index}: {e}"))
        })?;
        versions.push(version);
    }

    let metadata = match document.get("metadata") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value::<BackupMetadata>(value.clone()) {
            Ok(metadata) => {
                validate_settings(&metadata)?;
                Some(metadata)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable metadata in import");
                None
            }
        },
    };

    Ok(ImportedHistory { metadata, versions })
}

fn validate_settings(metadata: &BackupMetadata) -> VersioningResult<()> {
    validate_max_versions(metadata.max_versions)
        .and_then(|()| validate_backup_interval(metadata.backup_interval))
        .map_err(|e| match e {
            VersioningError::InvalidConfig(reason) => {
                VersioningError::InvalidImport(format!("metadata: {reason}"))
            }
            other => other,
        })
}
