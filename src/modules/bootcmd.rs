//! Bootcmd module - execute early boot commands
//!
//! These commands run before every other phase. They should be used
//! sparingly and only when necessary for early system configuration.

use super::PhaseContext;
use super::runcmd::run_command_list;
use crate::CloudApplyError;
use crate::config::Document;

/// Execute bootcmd directives (early boot commands)
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    run_command_list("bootcmd", doc.bootcmd(), ctx).await
}
