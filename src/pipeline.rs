//! Execution pipeline
//!
//! Drives one run: completion check, normalization, override merge,
//! validation, the ordered phases, and finally the completion stamp.
//!
//! ```text
//! Idle -> CheckingCompletion -> Normalizing -> Merging -> Validating
//!      -> Executing(bootcmd) -> ... -> Executing(final_message)
//!      -> Committing -> Done
//! ```
//!
//! Any fatal error moves the pipeline to `Aborted`.

use crate::config::Document;
use crate::config::format::normalize_file;
use crate::config::loader::{WorkingCopy, read_config};
use crate::config::validate::validate_source;
use crate::modules::{Phase, PhaseContext, run_phase};
use crate::runner::CommandRunner;
use crate::state::{BackupRecord, BackupStore, CompletionStamp};
use crate::{CloudApplyError, Mode, RunConfiguration};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    CheckingCompletion,
    Normalizing,
    Merging,
    Validating,
    Executing(Phase),
    Committing,
    Done,
    Aborted,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CheckingCompletion => write!(f, "checking completion"),
            Self::Normalizing => write!(f, "normalizing"),
            Self::Merging => write!(f, "merging"),
            Self::Validating => write!(f, "validating"),
            Self::Executing(phase) => write!(f, "executing {phase}"),
            Self::Committing => write!(f, "committing"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// What a run did (or would have done)
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub mode: Mode,
    /// "would ..." lines, dry-run only
    pub planned: Vec<String>,
    /// Commands handed to the runner
    pub executed: usize,
    /// Best-effort commands that failed
    pub tolerated_failures: Vec<String>,
    pub backups: Vec<BackupRecord>,
    /// Rendered final messages
    pub messages: Vec<String>,
    /// Validation warnings
    pub warnings: Vec<String>,
    pub completed_phases: Vec<Phase>,
    pub skipped_phases: Vec<Phase>,
    /// The source was rewritten from flow to block form
    pub normalized: bool,
    /// The completion stamp was written
    pub stamped: bool,
}

/// Single-run pipeline
pub struct Pipeline<'a> {
    config: &'a RunConfiguration,
    runner: &'a dyn CommandRunner,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RunConfiguration, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Apply the config at `source`, optionally merged with an override
    pub async fn run(
        &mut self,
        source: &Path,
        override_spec: Option<&str>,
    ) -> Result<RunReport, CloudApplyError> {
        info!(
            "Applying {} in {} mode",
            source.display(),
            self.config.mode
        );

        match self.run_inner(source, override_spec).await {
            Ok(report) => {
                self.transition(PipelineState::Done);
                info!(
                    "Run complete: {} phases, {} commands, {} tolerated failures",
                    report.completed_phases.len(),
                    report.executed,
                    report.tolerated_failures.len()
                );
                Ok(report)
            }
            Err(e) => {
                error!("Run aborted while {}: {}", self.state, e);
                self.transition(PipelineState::Aborted);
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        source: &Path,
        override_spec: Option<&str>,
    ) -> Result<RunReport, CloudApplyError> {
        let mut report = RunReport {
            mode: self.config.mode,
            ..RunReport::default()
        };

        self.transition(PipelineState::CheckingCompletion);
        let stamp = CompletionStamp::new(self.config.paths.completion_stamp());
        if stamp.is_completed() {
            if !self.config.force {
                return Err(CloudApplyError::AlreadyCompleted(stamp.path().to_path_buf()));
            }
            warn!(
                "Completion stamp {} present; continuing because of --force",
                stamp.path().display()
            );
        }

        self.transition(PipelineState::Normalizing);
        if !source.is_file() {
            return Err(CloudApplyError::MissingConfig(source.to_path_buf()));
        }
        report.normalized = normalize_file(source)?;

        // Dropping the working copy removes it, so every early return cleans up
        let working = WorkingCopy::create(source).await?;

        self.transition(PipelineState::Merging);
        match override_spec {
            Some(spec) => {
                working.apply_override(spec).await?;
            }
            None => debug!("No override given"),
        }

        self.transition(PipelineState::Validating);
        let text = read_config(working.path()).await?;
        let (doc, validation) = validate_source(&text, self.config)?;
        report.warnings = validation.warnings.iter().map(|w| w.to_string()).collect();

        self.execute_phases(&doc, validation.skip_timezone, working.dir(), &mut report)
            .await?;

        self.transition(PipelineState::Committing);
        if self.config.is_execute() {
            stamp.mark_completed().await?;
            report.stamped = true;
        } else {
            debug!("Dry run; completion stamp not written");
        }

        working.close();
        Ok(report)
    }

    async fn execute_phases(
        &mut self,
        doc: &Document,
        skip_timezone: bool,
        staging: &Path,
        report: &mut RunReport,
    ) -> Result<(), CloudApplyError> {
        let backups = BackupStore::new(self.config.paths.backup_dir(), self.config.backups);

        for phase in Phase::ALL {
            if phase == Phase::Timezone && skip_timezone {
                warn!("Skipping timezone phase: no zoneinfo data for requested zone");
                report.skipped_phases.push(phase);
                continue;
            }

            self.transition(PipelineState::Executing(phase));
            let mut ctx = PhaseContext::new(
                phase,
                self.config,
                self.runner,
                &backups,
                staging,
                report,
            );
            run_phase(phase, doc, &mut ctx).await?;
            report.completed_phases.push(phase);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::packages::PackageManager;
    use crate::runner::{CommandOutcome, MockRunner};
    use crate::state::StatePaths;
    use tempfile::TempDir;

    fn config(temp: &TempDir, mode: Mode) -> RunConfiguration {
        RunConfiguration::default()
            .with_mode(mode)
            .with_paths(StatePaths::with_base(temp.path().join("state")))
            .with_zoneinfo_dir(temp.path())
            .with_package_manager(PackageManager::Apt)
    }

    fn source(temp: &TempDir, text: &str) -> std::path::PathBuf {
        let path = temp.path().join("user-data.yaml");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_dry_run_reaches_done() {
        let temp = TempDir::new().unwrap();
        let src = source(&temp, "hostname: a\n");
        let config = config(&temp, Mode::DryRun);
        let runner = MockRunner::new();

        let mut pipeline = Pipeline::new(&config, &runner);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        let report = pipeline.run(&src, None).await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(report.completed_phases, Phase::ALL.to_vec());
        assert_eq!(report.planned, vec!["would set hostname to a"]);
        assert!(!report.stamped);
    }

    #[tokio::test]
    async fn test_missing_source_aborts() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp, Mode::DryRun);
        let runner = MockRunner::new();

        let mut pipeline = Pipeline::new(&config, &runner);
        let err = pipeline
            .run(&temp.path().join("absent.yaml"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudApplyError::MissingConfig(_)));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
    }

    #[tokio::test]
    async fn test_strict_failure_aborts_and_skips_stamp() {
        let temp = TempDir::new().unwrap();
        let src = source(&temp, "hostname: a\nlocale: C.UTF-8\n");
        let config = config(&temp, Mode::Execute).with_backups(false);
        let runner = MockRunner::new().fail_when(
            "hostnamectl",
            CommandOutcome::Failed {
                exit_code: Some(1),
                stderr: String::new(),
            },
        );

        let mut pipeline = Pipeline::new(&config, &runner);
        let err = pipeline.run(&src, None).await.unwrap_err();

        assert!(matches!(err, CloudApplyError::Execution { .. }));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert!(!runner.commands().iter().any(|c| c.contains("locale")));
        assert!(!config.paths.completion_stamp().exists());
    }

    #[tokio::test]
    async fn test_unknown_timezone_skips_only_that_phase() {
        let temp = TempDir::new().unwrap();
        let src = source(&temp, "timezone: Nowhere/City\nlocale: C.UTF-8\n");
        let config = config(&temp, Mode::DryRun);
        let runner = MockRunner::new();

        let report = Pipeline::new(&config, &runner)
            .run(&src, None)
            .await
            .unwrap();

        assert_eq!(report.skipped_phases, vec![Phase::Timezone]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.planned,
            vec!["would generate locale C.UTF-8", "would set locale to C.UTF-8"]
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            PipelineState::Executing(Phase::SshKeys).to_string(),
            "executing ssh_keys"
        );
        assert_eq!(PipelineState::Aborted.to_string(), "aborted");
    }
}
