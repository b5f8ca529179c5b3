//! Configuration phases
//!
//! Each phase reads its section(s) of the validated document and turns every
//! item into a described shell command. Phases run in a fixed order: boot
//! commands first, packages before anything that may need them, users before
//! their SSH keys, runcmd and the final message last.

pub mod bootcmd;
pub mod final_message;
pub mod hostname;
pub mod locale;
pub mod packages;
pub mod runcmd;
pub mod ssh_keys;
pub mod timezone;
pub mod users;
pub mod write_files;

use crate::config::Document;
use crate::pipeline::RunReport;
use crate::runner::{CommandRequest, CommandRunner};
use crate::state::BackupStore;
use crate::{CloudApplyError, RunConfiguration};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Bootcmd,
    Packages,
    Users,
    SshKeys,
    WriteFiles,
    Hostname,
    Timezone,
    Locale,
    Runcmd,
    FinalMessage,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 10] = [
        Phase::Bootcmd,
        Phase::Packages,
        Phase::Users,
        Phase::SshKeys,
        Phase::WriteFiles,
        Phase::Hostname,
        Phase::Timezone,
        Phase::Locale,
        Phase::Runcmd,
        Phase::FinalMessage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Bootcmd => "bootcmd",
            Phase::Packages => "packages",
            Phase::Users => "users",
            Phase::SshKeys => "ssh_keys",
            Phase::WriteFiles => "write_files",
            Phase::Hostname => "hostname",
            Phase::Timezone => "timezone",
            Phase::Locale => "locale",
            Phase::Runcmd => "runcmd",
            Phase::FinalMessage => "final_message",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one phase against the document
pub async fn run_phase(
    phase: Phase,
    doc: &Document,
    ctx: &mut PhaseContext<'_>,
) -> Result<(), CloudApplyError> {
    match phase {
        Phase::Bootcmd => bootcmd::apply(doc, ctx).await,
        Phase::Packages => packages::apply(doc, ctx).await,
        Phase::Users => users::apply(doc, ctx).await,
        Phase::SshKeys => ssh_keys::apply(doc, ctx).await,
        Phase::WriteFiles => write_files::apply(doc, ctx).await,
        Phase::Hostname => hostname::apply(doc, ctx).await,
        Phase::Timezone => timezone::apply(doc, ctx).await,
        Phase::Locale => locale::apply(doc, ctx).await,
        Phase::Runcmd => runcmd::apply(doc, ctx).await,
        Phase::FinalMessage => final_message::apply(doc, ctx).await,
    }
}

/// A command plus the files it is about to overwrite
#[derive(Debug, Clone)]
pub struct Step {
    pub request: CommandRequest,
    pub backup: Vec<PathBuf>,
}

impl Step {
    pub fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            request: CommandRequest::new(description, command),
            backup: Vec::new(),
        }
    }

    pub fn allow_failure(mut self, allow: bool) -> Self {
        self.request.allow_failure = allow;
        self
    }

    /// Back up `path` before the command runs (execute mode only)
    pub fn backup(mut self, path: impl AsRef<Path>) -> Self {
        self.backup.push(path.as_ref().to_path_buf());
        self
    }
}

/// Everything a phase needs to issue commands
pub struct PhaseContext<'a> {
    phase: Phase,
    pub config: &'a RunConfiguration,
    runner: &'a dyn CommandRunner,
    backups: &'a BackupStore,
    /// Per-run scratch directory, removed with the working copy
    staging: &'a Path,
    report: &'a mut RunReport,
}

impl<'a> PhaseContext<'a> {
    pub fn new(
        phase: Phase,
        config: &'a RunConfiguration,
        runner: &'a dyn CommandRunner,
        backups: &'a BackupStore,
        staging: &'a Path,
        report: &'a mut RunReport,
    ) -> Self {
        Self {
            phase,
            config,
            runner,
            backups,
            staging,
            report,
        }
    }

    /// Put `content` in a staging file a command can read from
    ///
    /// Keeps large payloads out of the command line. The path is returned in
    /// dry run too, but nothing is written there.
    pub async fn stage(&self, content: &[u8]) -> Result<PathBuf, CloudApplyError> {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        let path = self
            .staging
            .join(format!("{}.{}", self.phase, &unique[..8]));

        if self.config.is_execute() {
            tokio::fs::write(&path, content).await?;
            debug!("Staged {} bytes at {}", content.len(), path.display());
        }
        Ok(path)
    }

    /// Issue one step under the run's mode and the step's failure policy
    ///
    /// Dry run only logs the step. Execute mode backs up the step's targets,
    /// runs the command, and turns a strict failure into an error.
    pub async fn exec(&mut self, step: Step) -> Result<(), CloudApplyError> {
        let Step { request, backup } = step;

        if !self.config.is_execute() {
            info!(
                "[{}] would {}: {}",
                self.phase, request.description, request.command
            );
            self.report
                .planned
                .push(format!("would {}", request.description));
            return Ok(());
        }

        for path in &backup {
            if let Some(record) = self.backups.backup(path).await {
                self.report.backups.push(record);
            }
        }

        info!("[{}] {}", self.phase, request.description);
        let outcome = self.runner.run(&request).await;
        self.report.executed += 1;

        if outcome.is_success() {
            return Ok(());
        }

        if request.allow_failure {
            warn!(
                "[{}] '{}' failed ({}); continuing",
                self.phase,
                request.description,
                outcome.reason()
            );
            self.report
                .tolerated_failures
                .push(format!("{}: {}", request.description, outcome.reason()));
            Ok(())
        } else {
            error!(
                "[{}] '{}' failed: {}",
                self.phase,
                request.description,
                outcome.reason()
            );
            Err(CloudApplyError::execution(
                self.phase.name(),
                request.description,
                outcome.reason(),
            ))
        }
    }

    /// Record a message that involves no command
    pub fn message(&mut self, message: String) {
        info!("{}", message);
        self.report.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let names: Vec<&str> = Phase::ALL.iter().map(Phase::name).collect();
        assert_eq!(
            names,
            vec![
                "bootcmd",
                "packages",
                "users",
                "ssh_keys",
                "write_files",
                "hostname",
                "timezone",
                "locale",
                "runcmd",
                "final_message"
            ]
        );
    }

    #[test]
    fn test_step_builder() {
        let step = Step::new("set hostname to a", "hostname a")
            .backup("/etc/hostname")
            .allow_failure(true);
        assert!(step.request.allow_failure);
        assert_eq!(step.backup, vec![PathBuf::from("/etc/hostname")]);
    }
}
