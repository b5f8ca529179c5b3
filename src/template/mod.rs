//! Jinja2-compatible template rendering
//!
//! `final_message` may reference `{{ hostname }}`, `{{ timezone }}`,
//! `{{ locale }}`, `{{ mode }}`, `{{ version }}` and `{{ timestamp }}`.

pub mod context;

pub use context::build_context;

use crate::config::Document;
use crate::{CloudApplyError, RunConfiguration};
use minijinja::Environment;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Render a Jinja template with a custom context
pub fn render_template_with_context(
    template: &str,
    context: &HashMap<String, minijinja::Value>,
) -> Result<String, CloudApplyError> {
    debug!("Rendering Jinja template");

    let mut env = Environment::new();
    env.add_template("template", template)
        .map_err(|e| CloudApplyError::InvalidData(format!("Template parse error: {}", e)))?;

    let tmpl = env
        .get_template("template")
        .map_err(|e| CloudApplyError::InvalidData(format!("Template error: {}", e)))?;

    tmpl.render(context)
        .map_err(|e| CloudApplyError::InvalidData(format!("Template render error: {}", e)))
}

/// Render the final message, falling back to the raw text
pub fn render_final_message(message: &str, doc: &Document, config: &RunConfiguration) -> String {
    if !message.contains("{{") && !message.contains("{%") {
        return message.to_string();
    }

    match render_template_with_context(message, &build_context(doc, config)) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("final_message left unrendered: {}", e);
            message.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from_yaml("hostname: srv1\ntimezone: UTC\n").unwrap()
    }

    #[test]
    fn test_plain_message_unchanged() {
        let config = RunConfiguration::default();
        assert_eq!(render_final_message("done", &doc(), &config), "done");
    }

    #[test]
    fn test_render_variables() {
        let config = RunConfiguration::default();
        assert_eq!(
            render_final_message("{{ hostname }} ({{ timezone }}) {{ mode }}", &doc(), &config),
            "srv1 (UTC) dry-run"
        );
    }

    #[test]
    fn test_render_conditional() {
        let config = RunConfiguration::default();
        let message = "{% if locale %}{{ locale }}{% else %}no locale{% endif %}";
        assert_eq!(render_final_message(message, &doc(), &config), "no locale");
    }

    #[test]
    fn test_invalid_syntax_falls_back() {
        let config = RunConfiguration::default();
        assert_eq!(
            render_final_message("value: {{ invalid", &doc(), &config),
            "value: {{ invalid"
        );
    }

    #[test]
    fn test_render_missing_variable() {
        // minijinja treats missing as empty string by default
        let result = render_template_with_context("[{{ missing }}]", &HashMap::new());
        assert_eq!(result.unwrap(), "[]");
    }
}
