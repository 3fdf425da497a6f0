//! Short-lived note describing the most recent import

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sync::{SyncSession, SyncStatus};

/// Filename of the note in the CycleGraph config directory
pub const SUMMARY_FILE: &str = "last-import.json";

/// Result of the last import, left for the next screen to show
///
/// Best-effort only: losing it never affects imported rides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub status: SyncStatus,
    pub imported_total: usize,
    pub error_count: usize,
    /// Pages merged during the run
    pub pages: u32,
    pub message: String,
    pub finished_at: DateTime<Utc>,
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl ImportSummary {
    /// Summarize a finished session
    pub fn from_session(session: &SyncSession) -> Self {
        Self {
            status: session.status(),
            imported_total: session.total_imported(),
            error_count: session.error_records().len(),
            pages: session.batches(),
            message: session.message().to_string(),
            finished_at: Utc::now(),
            version: default_version(),
        }
    }

    /// Whether the note is fresh enough to show (less than a day old)
    pub fn is_recent(&self) -> bool {
        let age = Utc::now() - self.finished_at;
        age.num_hours() < 24
    }

    /// Write the note to the config directory
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(SUMMARY_FILE, self)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    /// Read the note from the config directory, if there is one
    pub fn load_latest() -> Result<Option<Self>> {
        if !config::config_exists(SUMMARY_FILE) {
            return Ok(None);
        }
        config::load_json(SUMMARY_FILE).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn summary(hours_ago: i64) -> ImportSummary {
        ImportSummary {
            status: SyncStatus::Done,
            imported_total: 12,
            error_count: 1,
            pages: 3,
            message: "Import complete: 12 rides imported".to_string(),
            finished_at: Utc::now() - chrono::Duration::hours(hours_ago),
            version: 1,
        }
    }

    #[test]
    fn test_from_idle_session() {
        let s = ImportSummary::from_session(&SyncSession::default());
        assert_eq!(s.status, SyncStatus::Idle);
        assert_eq!(s.imported_total, 0);
        assert_eq!(s.pages, 0);
    }

    #[test]
    fn test_is_recent() {
        assert!(summary(0).is_recent());
        assert!(summary(23).is_recent());
        assert!(!summary(25).is_recent());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let original = summary(1);

        original.save_to(&path).unwrap();
        let loaded = ImportSummary::load_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_version_defaults() {
        let json = r#"{
            "status": "cancelled",
            "imported_total": 3,
            "error_count": 0,
            "pages": 3,
            "message": "Import cancelled: 3 rides imported",
            "finished_at": "2026-10-01T10:00:00Z"
        }"#;
        let loaded: ImportSummary = serde_json::from_str(json).unwrap();
        assert_eq!(loaded.status, SyncStatus::Cancelled);
        assert_eq!(loaded.version, 1);
    }
}
