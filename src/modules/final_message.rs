//! Final message module
//!
//! Logs the rendered `final_message`; no command is issued.

use super::PhaseContext;
use crate::CloudApplyError;
use crate::config::Document;
use crate::template;

pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    if let Some(message) = doc.final_message() {
        let rendered = template::render_final_message(&message, doc, ctx.config);
        ctx.message(rendered);
    }
    Ok(())
}
