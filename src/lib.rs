//! cloud-config-apply library
//!
//! Applies a declarative cloud-config document to a freshly booted host:
//! packages, users, SSH keys, files, hostname, timezone and locale.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Dry Run by Default**: Nothing mutates the host unless execute mode is requested
//! - **Run Once**: A completion stamp blocks re-application unless forced
//! - **Backwards Compatible**: Accepts block YAML and single flow/JSON literals

pub mod config;
pub mod modules;
pub mod pipeline;
pub mod runner;
pub mod runtime;
pub mod state;
pub mod template;

mod error;

pub use error::CloudApplyError;
pub use pipeline::{Pipeline, PipelineState, RunReport};
pub use runtime::{Mode, RunConfiguration};

/// Result kinds surfaced to the caller (and mapped to process exit codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    InvalidUsage,
    MissingOrInvalidConfig,
    /// A tool the run depends on (e.g. a package manager) could not be found
    DependencyUnavailable,
    AlreadyCompleted,
    ValidationFailure,
    ExecutionFailure,
}

impl ExitKind {
    /// Process exit code for this result kind
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::InvalidUsage => 2,
            Self::MissingOrInvalidConfig => 3,
            Self::DependencyUnavailable => 4,
            Self::AlreadyCompleted => 5,
            Self::ValidationFailure => 6,
            Self::ExecutionFailure => 7,
        }
    }
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::InvalidUsage => write!(f, "invalid usage"),
            Self::MissingOrInvalidConfig => write!(f, "missing or invalid config"),
            Self::DependencyUnavailable => write!(f, "dependency unavailable"),
            Self::AlreadyCompleted => write!(f, "already completed"),
            Self::ValidationFailure => write!(f, "validation failure"),
            Self::ExecutionFailure => write!(f, "execution failure"),
        }
    }
}
