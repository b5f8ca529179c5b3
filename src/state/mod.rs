//! Host state owned by the tool
//!
//! - Completion stamp gating re-application
//! - Backups of files overwritten during a run

pub mod backup;
pub mod paths;
pub mod stamp;

pub use backup::{BackupRecord, BackupStore};
pub use paths::{STATE_DIR, StatePaths};
pub use stamp::CompletionStamp;
