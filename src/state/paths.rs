//! Standard state paths
//!
//! Defines where the completion stamp and backups live.

use std::path::{Path, PathBuf};

/// Base directory for run state
pub const STATE_DIR: &str = "/var/lib/cloud-config-apply";

/// State locations used by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Base state directory (default: /var/lib/cloud-config-apply)
    pub base: PathBuf,
    /// Backup directory override (default: `<base>/backups`)
    pub backups: Option<PathBuf>,
}

impl Default for StatePaths {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePaths {
    /// Create with default paths
    pub fn new() -> Self {
        Self {
            base: PathBuf::from(STATE_DIR),
            backups: None,
        }
    }

    /// Create with custom base directory (useful for testing)
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            backups: None,
        }
    }

    /// Create with custom base and backup directories
    pub fn with_dirs(base: impl AsRef<Path>, backups: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            backups: Some(backups.as_ref().to_path_buf()),
        }
    }

    /// <base>/completed - Completion stamp; presence means a prior execute run finished
    pub fn completion_stamp(&self) -> PathBuf {
        self.base.join("completed")
    }

    /// <base>/backups - Copies of files taken before they were overwritten
    pub fn backup_dir(&self) -> PathBuf {
        self.backups
            .clone()
            .unwrap_or_else(|| self.base.join("backups"))
    }
}
