//! Backup store
//!
//! Files about to be overwritten are copied into the backup directory under a
//! unique, timestamp-suffixed name. Backups are best effort: a failure is
//! logged and the mutation goes ahead.

use super::stamp::unix_timestamp;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// One copy taken before a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub source_path: PathBuf,
    pub backup_path: PathBuf,
    pub timestamp: u64,
}

/// Timestamped copies of files about to change
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    enabled: bool,
}

impl BackupStore {
    pub fn new(dir: impl AsRef<Path>, enabled: bool) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            enabled,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `path` aside; `None` when disabled, absent, or the copy failed
    pub async fn backup(&self, path: &Path) -> Option<BackupRecord> {
        if !self.enabled {
            return None;
        }
        if !path.exists() {
            debug!("Nothing to back up at {}", path.display());
            return None;
        }

        let timestamp = unix_timestamp();
        let backup_path = self.dir.join(backup_name(path, timestamp));

        if let Err(e) = fs::create_dir_all(&self.dir).await {
            warn!(
                "Could not create backup directory {}: {}",
                self.dir.display(),
                e
            );
            return None;
        }

        match fs::copy(path, &backup_path).await {
            Ok(_) => {
                info!("Backed up {} to {}", path.display(), backup_path.display());
                Some(BackupRecord {
                    source_path: path.to_path_buf(),
                    backup_path,
                    timestamp,
                })
            }
            Err(e) => {
                warn!("Could not back up {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Existing backup file names, sorted
    pub async fn list(&self) -> Result<Vec<String>, std::io::Error> {
        let mut names = Vec::new();

        if self.dir.exists() {
            let mut entries = fs::read_dir(&self.dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Remove the whole backup directory
    pub async fn clear(&self) -> Result<(), std::io::Error> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).await?;
            debug!("Cleared backups in: {}", self.dir.display());
        }
        Ok(())
    }
}

/// `/etc/ssh/sshd_config` -> `etc_ssh_sshd_config.<unique>.<timestamp>`
fn backup_name(path: &Path, timestamp: u64) -> String {
    let flat = path
        .to_string_lossy()
        .trim_start_matches('/')
        .replace('/', "_");
    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!("{}.{}.{}", flat, &unique[..8], timestamp)
}
