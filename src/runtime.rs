//! Run configuration
//!
//! Everything that used to be ambient process state (execute/dry-run mode,
//! force flag, backup toggle, directories) lives in one immutable value that
//! is passed by reference to every component.

use crate::modules::packages::PackageManager;
use crate::state::StatePaths;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bound on each external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// System timezone database
pub const ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

/// Whether commands are actually executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Log what would run, touch nothing
    #[default]
    DryRun,
    /// Run commands and mutate the host
    Execute,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::DryRun => write!(f, "dry-run"),
            Mode::Execute => write!(f, "execute"),
        }
    }
}

/// Immutable settings for a single pipeline run
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub mode: Mode,
    /// Ignore an existing completion stamp
    pub force: bool,
    /// Copy files aside before they are overwritten
    pub backups: bool,
    pub paths: StatePaths,
    pub zoneinfo_dir: PathBuf,
    pub command_timeout: Duration,
    /// Package manager to use; detected on the host when unset
    pub package_manager: Option<PackageManager>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            mode: Mode::DryRun,
            force: false,
            backups: true,
            paths: StatePaths::new(),
            zoneinfo_dir: PathBuf::from(ZONEINFO_DIR),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            package_manager: None,
        }
    }
}

impl RunConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    pub fn with_paths(mut self, paths: StatePaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_zoneinfo_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.zoneinfo_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_package_manager(mut self, pm: PackageManager) -> Self {
        self.package_manager = Some(pm);
        self
    }

    /// True when commands really run
    pub fn is_execute(&self) -> bool {
        self.mode == Mode::Execute
    }
}
