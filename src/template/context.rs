//! Template context building
//!
//! Exposes the effective document's scalar settings plus run facts to the
//! final message template.

use crate::RunConfiguration;
use crate::config::Document;
use crate::state::stamp::unix_timestamp;
use minijinja::value::Value;
use std::collections::HashMap;

/// Build the template context for a document and run
pub fn build_context(doc: &Document, config: &RunConfiguration) -> HashMap<String, Value> {
    let mut ctx = HashMap::new();

    for (name, value) in [
        ("hostname", doc.hostname()),
        ("timezone", doc.timezone()),
        ("locale", doc.locale()),
    ] {
        if let Some(value) = value {
            ctx.insert(name.to_string(), Value::from(value));
        }
    }

    ctx.insert("mode".to_string(), Value::from(config.mode.to_string()));
    ctx.insert("version".to_string(), Value::from(env!("CARGO_PKG_VERSION")));
    ctx.insert("timestamp".to_string(), Value::from(unix_timestamp()));

    ctx
}
