//! Runcmd module - execute commands from cloud-config
//!
//! Commands are strict unless written as `{cmd: ..., allow_failure: true}`.

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::{Document, RunCmd};
use tracing::{debug, info, warn};

/// Execute runcmd directives
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    run_command_list("runcmd", doc.runcmd(), ctx).await
}

/// Issue each command of a bootcmd/runcmd list in order
pub(crate) async fn run_command_list(
    section: &str,
    entries: Vec<Result<RunCmd, String>>,
    ctx: &mut PhaseContext<'_>,
) -> Result<(), CloudApplyError> {
    if entries.is_empty() {
        return Ok(());
    }

    let total = entries.len();
    info!("Executing {} {} commands", total, section);

    for (i, entry) in entries.into_iter().enumerate() {
        let cmd = match entry {
            Ok(cmd) => cmd,
            Err(message) => {
                warn!("Skipping malformed {}[{}]: {}", section, i, message);
                continue;
            }
        };
        let Some(line) = cmd.command_line() else {
            debug!("Skipping empty {}[{}]", section, i);
            continue;
        };

        let step = Step::new(format!("run {section} {}/{total}", i + 1), line)
            .allow_failure(cmd.allow_failure());
        ctx.exec(step).await?;
    }

    Ok(())
}
