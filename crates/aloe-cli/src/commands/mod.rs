//! CLI command handlers
//!
//! `version` manages individual versions, `history` works on the registry
//! as a whole, and `schedule` drives the auto-backup timer.

pub mod history;
pub mod schedule;
pub mod version;

use chrono::{DateTime, Local, Utc};

/// Local-time rendering used by every listing
pub(crate) fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
