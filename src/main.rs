//! cloud-config-apply - apply a cloud-config document to this host
//!
//! Dry run by default; pass `--execute` to actually change the system.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cloud_config_apply::config::format::normalize_file;
use cloud_config_apply::config::loader::load_for_validation;
use cloud_config_apply::runner::ShellRunner;
use cloud_config_apply::runtime::{DEFAULT_COMMAND_TIMEOUT, ZONEINFO_DIR};
use cloud_config_apply::state::{BackupStore, CompletionStamp, STATE_DIR, StatePaths};
use cloud_config_apply::{CloudApplyError, ExitKind, Mode, Pipeline, RunConfiguration};

#[derive(Parser)]
#[command(name = "cloud-config-apply")]
#[command(author, version, about = "Apply a cloud-config document to this host", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// State directory holding the completion stamp
    #[arg(long, env = "CLOUD_CONFIG_APPLY_STATE_DIR", default_value = STATE_DIR, global = true)]
    state_dir: PathBuf,

    /// Backup directory (default: <state-dir>/backups)
    #[arg(long, env = "CLOUD_CONFIG_APPLY_BACKUP_DIR", global = true)]
    backup_dir: Option<PathBuf>,

    /// Timezone database used to validate `timezone`
    #[arg(long, default_value = ZONEINFO_DIR, global = true)]
    zoneinfo_dir: PathBuf,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs(), global = true)]
    timeout: u64,

    /// Package manager (apt, dnf, yum, zypper, apk); detected when omitted
    #[arg(long, env = "CLOUD_CONFIG_APPLY_PACKAGE_MANAGER", global = true)]
    package_manager: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a config (dry run unless --execute)
    Apply {
        /// Cloud-config file
        config: PathBuf,
        /// Actually run commands
        #[arg(long)]
        execute: bool,
        /// Run even if a previous run completed
        #[arg(long)]
        force: bool,
        /// Override, `key=value[,key=value]` or a `{...}` literal
        #[arg(long = "override", value_name = "SPEC")]
        override_spec: Option<String>,
        /// Do not back up files before overwriting them
        #[arg(long)]
        no_backup: bool,
    },
    /// Check a config without changing anything
    Validate {
        /// Cloud-config file
        config: PathBuf,
        #[arg(long = "override", value_name = "SPEC")]
        override_spec: Option<String>,
    },
    /// Rewrite a flow-style config to block form
    Normalize {
        /// Cloud-config file
        config: PathBuf,
    },
    /// Show completion state and backups
    Status,
    /// Remove the completion stamp
    Clean {
        /// Remove backups as well
        #[arg(long)]
        backups: bool,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn run_configuration(cli: &Cli) -> Result<RunConfiguration, CloudApplyError> {
    let paths = match &cli.backup_dir {
        Some(backups) => StatePaths::with_dirs(&cli.state_dir, backups),
        None => StatePaths::with_base(&cli.state_dir),
    };

    let mut config = RunConfiguration::new()
        .with_paths(paths)
        .with_zoneinfo_dir(&cli.zoneinfo_dir)
        .with_timeout(Duration::from_secs(cli.timeout));

    if let Some(name) = &cli.package_manager {
        config = config.with_package_manager(name.parse()?);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(kind) => ExitCode::from(kind.code()),
        Err(e) => {
            error!("{:#}", e);
            let kind = e
                .downcast_ref::<CloudApplyError>()
                .map(CloudApplyError::exit_kind)
                .unwrap_or(ExitKind::ExecutionFailure);
            ExitCode::from(kind.code())
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitKind> {
    let config = run_configuration(&cli)?;

    match cli.command {
        Commands::Apply {
            config: source,
            execute,
            force,
            override_spec,
            no_backup,
        } => {
            let mode = if execute { Mode::Execute } else { Mode::DryRun };
            let config = config
                .with_mode(mode)
                .with_force(force)
                .with_backups(!no_backup);
            let runner = ShellRunner::new(config.command_timeout);

            let report = Pipeline::new(&config, &runner)
                .run(&source, override_spec.as_deref())
                .await?;

            if !config.is_execute() {
                info!(
                    "Dry run finished: {} commands planned; rerun with --execute to apply",
                    report.planned.len()
                );
            }
        }
        Commands::Validate {
            config: source,
            override_spec,
        } => {
            let (_, report) = load_for_validation(&source, override_spec.as_deref(), &config)
                .await
                .with_context(|| format!("validating {}", source.display()))?;

            if report.is_clean() {
                println!("{}: valid", source.display());
            } else {
                println!(
                    "{}: valid with {} warning(s)",
                    source.display(),
                    report.warnings.len()
                );
                for warning in &report.warnings {
                    println!("  - {warning}");
                }
            }
        }
        Commands::Normalize { config: source } => {
            let rewritten = normalize_file(&source)?;
            if rewritten {
                println!("{}: normalized to block form", source.display());
            } else {
                println!("{}: already block form", source.display());
            }
        }
        Commands::Status => {
            let stamp = CompletionStamp::new(config.paths.completion_stamp());
            if stamp.is_completed() {
                println!("status: completed ({})", stamp.path().display());
            } else {
                println!("status: not run");
            }

            let store = BackupStore::new(config.paths.backup_dir(), true);
            let backups = store
                .list()
                .await
                .with_context(|| format!("listing {}", store.dir().display()))?;
            println!("backups: {}", backups.len());
            for name in backups {
                println!("  {name}");
            }
        }
        Commands::Clean { backups } => {
            let stamp = CompletionStamp::new(config.paths.completion_stamp());
            if stamp.clear().await? {
                info!("Removed {}", stamp.path().display());
            } else {
                info!("No completion stamp to remove");
            }

            if backups {
                let store = BackupStore::new(config.paths.backup_dir(), true);
                store
                    .clear()
                    .await
                    .with_context(|| format!("removing {}", store.dir().display()))?;
                info!("Removed backups in {}", store.dir().display());
            }
        }
    }

    Ok(ExitKind::Success)
}
