//! Surface syntax detection and normalization
//!
//! A cloud-config may arrive either as ordinary block YAML or as one flow
//! literal (`{...}` or `[...]`, which includes plain JSON). Flow documents are
//! rewritten into block form before anything else reads them.

use super::{CLOUD_CONFIG_HEADER, Document};
use crate::CloudApplyError;
use serde_yaml::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// True when the whole document is a single flow-style literal
///
/// Comments and surrounding whitespace are ignored. The first significant
/// character must open a `{` or `[` whose matching close is the last
/// significant character. Never fails.
pub fn is_flow_style(text: &str) -> bool {
    let stripped = strip_comments(text);
    let body = stripped.trim();

    let open = match body.chars().next() {
        Some(c @ ('{' | '[')) => c,
        _ => return false,
    };

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let last = body.len() - body.chars().next_back().map_or(0, char::len_utf8);

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
                if depth == 0 {
                    let close = if open == '{' { '}' } else { ']' };
                    return i == last && c == close;
                }
            }
            _ => {}
        }
    }

    false
}

/// Drop `#` comments: at line start or after whitespace, outside quotes
///
/// Quote state carries across lines since flow scalars may span several.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for line in text.lines() {
        let mut prev_is_space = true;
        let mut cut = line.len();

        for (i, c) in line.char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q == '"' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            } else if c == '"' || c == '\'' {
                quote = Some(c);
            } else if c == '#' && prev_is_space {
                cut = i;
                break;
            }
            prev_is_space = c.is_whitespace();
        }

        out.push_str(&line[..cut]);
        out.push('\n');
    }

    out
}

/// Convert a flow-style document to canonical block form
///
/// The literal is parsed as YAML flow syntax first and as plain JSON second.
/// `path` only names the source in the error.
pub fn normalize(text: &str, path: &Path) -> Result<String, CloudApplyError> {
    let value = match serde_yaml::from_str::<Value>(text) {
        Ok(value) => value,
        Err(yaml_err) => {
            debug!("Flow parse failed ({}), retrying as JSON", yaml_err);
            let json: serde_json::Value =
                serde_json::from_str(strip_comments(text).trim()).map_err(|json_err| {
                    CloudApplyError::format(
                        path,
                        format!("not valid flow YAML ({yaml_err}) or JSON ({json_err})"),
                    )
                })?;
            serde_yaml::to_value(json)?
        }
    };

    match value {
        Value::Mapping(root) => Ok(Document::from_mapping(root).to_yaml()?),
        Value::Null => Ok(format!("{CLOUD_CONFIG_HEADER}\n")),
        other => Ok(format!(
            "{CLOUD_CONFIG_HEADER}\n{}",
            serde_yaml::to_string(&other)?
        )),
    }
}

/// Normalize the file at `path` in place when it is flow-style
///
/// Returns whether the file was rewritten. The replacement is written to a
/// sibling temporary file and renamed over the original.
pub fn normalize_file(path: &Path) -> Result<bool, CloudApplyError> {
    let text = std::fs::read_to_string(path)?;
    if !is_flow_style(&text) {
        debug!("{} is already block-style", path.display());
        return Ok(false);
    }

    let normalized = normalize(&text, path)?;
    replace_atomically(path, normalized.as_bytes())?;
    info!("Normalized flow-style config {}", path.display());
    Ok(true)
}

/// Normalize in memory without touching the source
pub fn normalize_text(text: &str, path: &Path) -> Result<String, CloudApplyError> {
    if is_flow_style(text) {
        normalize(text, path)
    } else {
        Ok(text.to_string())
    }
}

/// Write `bytes` beside `path` and rename over it
pub(crate) fn replace_atomically(path: &Path, bytes: &[u8]) -> Result<(), CloudApplyError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| CloudApplyError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_object_is_flow() {
        assert!(is_flow_style(r#"{"hostname":"x"}"#));
        assert!(is_flow_style("  \n{\"hostname\": \"x\"}\n\n"));
    }

    #[test]
    fn test_block_is_not_flow() {
        assert!(!is_flow_style("hostname: x\npackages:\n  - vim"));
        assert!(!is_flow_style("#cloud-config\nhostname: x\n"));
        assert!(!is_flow_style(""));
    }

    #[test]
    fn test_comments_ignored() {
        assert!(is_flow_style("#cloud-config\n{hostname: x} # trailing\n"));
        assert!(is_flow_style("# only a comment\n[1, 2]\n"));
    }

    #[test]
    fn test_two_literals_are_not_one() {
        assert!(!is_flow_style("{a: 1}\n{b: 2}"));
        assert!(!is_flow_style("{a: 1} trailing"));
        assert!(!is_flow_style("{a: 1]"));
        assert!(!is_flow_style("{a: [1, 2}"));
    }

    #[test]
    fn test_brackets_inside_strings() {
        assert!(is_flow_style(r##"{"a": "}", "b": "# not a comment"}"##));
        assert!(is_flow_style(r#"{"a": "quote \" then }"}"#));
    }

    #[test]
    fn test_quoted_scalar_spanning_lines() {
        let text = "{\"final_message\": \"line one\n  # still text\", \"hostname\": \"x\"}\n";
        assert!(strip_comments(text).contains("# still text"));
        assert!(is_flow_style(text));

        let doc = Document::from_yaml(&normalize(text, Path::new("c.yaml")).unwrap()).unwrap();
        assert_eq!(doc.final_message(), Some("line one # still text".to_string()));
    }

    #[test]
    fn test_normalize_flow_yaml() {
        let out = normalize("{hostname: srv1, packages: [curl]}", Path::new("c.yaml")).unwrap();
        assert!(out.starts_with("#cloud-config\n"));
        assert!(!is_flow_style(&out));
        let doc = Document::from_yaml(&out).unwrap();
        assert_eq!(doc.hostname(), Some("srv1".to_string()));
        assert_eq!(doc.packages(), vec!["curl"]);
    }

    #[test]
    fn test_normalize_failure_names_file() {
        let err = normalize("{hostname: [}", Path::new("/seed/user-data")).unwrap_err();
        assert!(matches!(err, CloudApplyError::Format { .. }));
        assert!(err.to_string().contains("/seed/user-data"));
    }

    #[test]
    fn test_normalize_file_in_place() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("user-data");
        std::fs::write(&path, r#"{"hostname": "x", "runcmd": ["echo hi"]}"#).unwrap();

        assert!(normalize_file(&path).unwrap());
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("hostname: x"));

        // Already block-style now
        assert!(!normalize_file(&path).unwrap());
    }
}
