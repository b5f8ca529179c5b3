//! Mock command runner for testing
//!
//! Records every request and answers with scripted outcomes.
//!
//! # Example
//! ```
//! use cloud_config_apply::runner::{CommandOutcome, MockRunner};
//!
//! let runner = MockRunner::new().fail_when("useradd", CommandOutcome::TimedOut);
//! assert!(runner.requests().is_empty());
//! ```

use super::{CommandOutcome, CommandRequest, CommandRunner};
use async_trait::async_trait;
use std::sync::Mutex;

/// Recording runner with scripted failures
#[derive(Debug, Default)]
pub struct MockRunner {
    failures: Vec<(String, CommandOutcome)>,
    requests: Mutex<Vec<CommandRequest>>,
}

impl MockRunner {
    /// Runner where every command succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` produce `outcome`
    pub fn fail_when(mut self, needle: impl Into<String>, outcome: CommandOutcome) -> Self {
        self.failures.push((needle.into(), outcome));
        self
    }

    /// Everything run so far, in order
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Command strings run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.command).collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, request: &CommandRequest) -> CommandOutcome {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        self.failures
            .iter()
            .find(|(needle, _)| request.command.contains(needle.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or(CommandOutcome::Success)
    }
}
