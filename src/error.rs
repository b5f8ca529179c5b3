//! Error types for cloud-config-apply

use crate::ExitKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cloud-config-apply operations
#[derive(Error, Debug)]
pub enum CloudApplyError {
    #[error("Unparseable cloud-config in {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("Invalid override specification: {0}")]
    OverrideSyntax(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Command '{description}' failed in phase '{phase}': {reason}")]
    Execution {
        phase: String,
        description: String,
        reason: String,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration already applied (stamp at {0}); use --force to run again")]
    AlreadyCompleted(PathBuf),

    #[error("Required tool unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudApplyError {
    /// Create a format error for the given file
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an execution error for a failed strict command
    pub fn execution(
        phase: impl Into<String>,
        description: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Execution {
            phase: phase.into(),
            description: description.into(),
            reason: reason.into(),
        }
    }

    /// The result kind surfaced to the caller for this error
    pub fn exit_kind(&self) -> ExitKind {
        match self {
            Self::Format { .. }
            | Self::MissingConfig(_)
            | Self::Validation(_)
            | Self::Yaml(_)
            | Self::Json(_) => ExitKind::MissingOrInvalidConfig,
            Self::OverrideSyntax(_) => ExitKind::ValidationFailure,
            Self::Execution { .. } | Self::InvalidData(_) | Self::Io(_) => {
                ExitKind::ExecutionFailure
            }
            Self::AlreadyCompleted(_) => ExitKind::AlreadyCompleted,
            Self::DependencyUnavailable(_) => ExitKind::DependencyUnavailable,
            Self::Usage(_) => ExitKind::InvalidUsage,
        }
    }
}
