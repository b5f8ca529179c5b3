//! Shell-backed command runner

use super::{CommandOutcome, CommandRequest, CommandRunner};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs each command with `sh -c` under a timeout
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, request: &CommandRequest) -> CommandOutcome {
        debug!("Running: {}", request.command);

        let child = Command::new("sh")
            .args(["-c", &request.command])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                warn!(
                    "'{}' did not finish within {}s",
                    request.description,
                    self.timeout.as_secs()
                );
                return CommandOutcome::TimedOut;
            }
            Ok(Err(e)) => {
                return CommandOutcome::Failed {
                    exit_code: None,
                    stderr: e.to_string(),
                };
            }
            Ok(Ok(output)) => output,
        };

        if !output.stdout.is_empty() {
            debug!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }

        if output.status.success() {
            CommandOutcome::Success
        } else {
            CommandOutcome::Failed {
                exit_code: Some(output.status.code().unwrap_or(-1)),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        let outcome = runner.run(&CommandRequest::new("noop", "true")).await;
        assert_eq!(outcome, CommandOutcome::Success);
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let runner = ShellRunner::new(Duration::from_secs(5));
        let outcome = runner
            .run(&CommandRequest::new("fail", "echo oops >&2; exit 3"))
            .await;
        assert_eq!(
            outcome,
            CommandOutcome::Failed {
                exit_code: Some(3),
                stderr: "oops\n".into()
            }
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = ShellRunner::new(Duration::from_millis(100));
        let outcome = runner.run(&CommandRequest::new("slow", "sleep 5")).await;
        assert_eq!(outcome, CommandOutcome::TimedOut);
    }
}
