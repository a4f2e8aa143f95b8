//! Versioning configuration
//!
//! Defaults can be overridden by a `config.toml` file in the data directory.

use crate::error::{VersioningError, VersioningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Name of the database file inside the data directory
pub const DATABASE_FILE_NAME: &str = "aloe.db";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "ALOE_DATA_DIR";

/// Configuration for a [`crate::VersioningSystem`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Prefix applied to every storage key
    pub key_prefix: String,
    /// Application name written into export documents
    pub app_name: String,
    /// Author recorded when none is given
    pub default_author: String,
    /// Retention cap used when metadata is first created
    pub max_versions: usize,
    /// Auto-backup interval (minutes) used when metadata is first created
    pub backup_interval_minutes: u64,
    /// Whether auto-backup starts enabled when metadata is first created
    pub auto_backup_enabled: bool,
    /// Minimum age of the latest version before an update creates a new one
    pub update_coalesce_secs: u64,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            key_prefix: "aloelocation_".to_string(),
            app_name: "Aloe Location".to_string(),
            default_author: "System".to_string(),
            max_versions: 50,
            backup_interval_minutes: 30,
            auto_backup_enabled: true,
            update_coalesce_secs: 60,
        }
    }
}

impl VersioningConfig {
    /// Load configuration from `<data_dir>/config.toml`, falling back to defaults
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(data_dir: &Path) -> VersioningResult<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            VersioningError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that numeric settings are usable
    ///
    /// # Errors
    /// Returns an error if a cap or interval is zero
    pub fn validate(&self) -> VersioningResult<()> {
        if self.max_versions == 0 {
            return Err(VersioningError::InvalidConfig(
                "max_versions must be at least 1".to_string(),
            ));
        }
        if self.backup_interval_minutes == 0 {
            return Err(VersioningError::InvalidConfig(
                "backup_interval_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the data directory: explicit path, then `ALOE_DATA_DIR`, then `~/.aloe`
///
/// # Errors
/// Returns an error if no home directory can be determined
pub fn resolve_data_dir(explicit: Option<&Path>) -> VersioningResult<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".aloe"))
        .ok_or_else(|| {
            VersioningError::InvalidConfig(
                "cannot determine home directory; set ALOE_DATA_DIR".to_string(),
            )
        })
}
