//! Completion stamp handling
//!
//! The stamp is a plain file. Its presence is all that matters; the content
//! (a timestamp) is informational only.

use crate::CloudApplyError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Idempotency guard backed by a stamp file
#[derive(Debug, Clone)]
pub struct CompletionStamp {
    path: PathBuf,
}

impl CompletionStamp {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when a previous execute-mode run completed
    pub fn is_completed(&self) -> bool {
        let exists = self.path.exists();
        debug!(
            "Completion stamp check: {} -> {}",
            self.path.display(),
            if exists { "present" } else { "absent" }
        );
        exists
    }

    /// Record a completed run
    pub async fn mark_completed(&self) -> Result<(), CloudApplyError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&self.path, unix_timestamp().to_string()).await?;
        info!("Created completion stamp {}", self.path.display());
        Ok(())
    }

    /// Remove the stamp so the next run proceeds; returns whether it existed
    pub async fn clear(&self) -> Result<bool, CloudApplyError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed completion stamp {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Seconds since the epoch (lightweight, no chrono dependency)
pub(crate) fn unix_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
