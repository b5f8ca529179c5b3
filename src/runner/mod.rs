//! External command execution
//!
//! Every host mutation goes through a [`CommandRunner`]. The production
//! runner shells out; the mock records what it was asked to run.

pub mod mock;
pub mod shell;

pub use mock::MockRunner;
pub use shell::ShellRunner;

use async_trait::async_trait;

/// A command the pipeline wants run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Human-readable summary, e.g. "install curl"
    pub description: String,
    /// Shell command string
    pub command: String,
    /// Failure is logged and tolerated instead of aborting the run
    pub allow_failure: bool,
}

impl CommandRequest {
    pub fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
            allow_failure: false,
        }
    }

    pub fn allow_failure(mut self, allow: bool) -> Self {
        self.allow_failure = allow;
        self
    }
}

/// What happened when a command ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    TimedOut,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }

    /// Short reason suitable for logs and errors
    pub fn reason(&self) -> String {
        match self {
            CommandOutcome::Success => "succeeded".to_string(),
            CommandOutcome::Failed {
                exit_code: Some(code),
                stderr,
            } if !stderr.trim().is_empty() => {
                format!("exit status {code}: {}", stderr.trim())
            }
            CommandOutcome::Failed {
                exit_code: Some(code),
                ..
            } => format!("exit status {code}"),
            CommandOutcome::Failed {
                exit_code: None,
                stderr,
            } => format!("could not run: {}", stderr.trim()),
            CommandOutcome::TimedOut => "timed out".to_string(),
        }
    }
}

/// Runs commands on the host
///
/// Implementations only report outcomes; the failure policy (abort or
/// tolerate) is applied by the caller from `allow_failure`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &CommandRequest) -> CommandOutcome;
}
