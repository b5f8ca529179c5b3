//! Pre-execution validation
//!
//! Only an unparseable document is fatal. Everything else is reported as a
//! warning and execution proceeds; an unknown timezone additionally marks the
//! timezone phase to be skipped.

use super::{Document, FileRecord, RunCmd, value_kind};
use crate::{CloudApplyError, RunConfiguration};
use regex::Regex;
use serde_yaml::Value;
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::{debug, warn};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]*$").expect("regex for username pattern"));

/// Non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    WrongType {
        section: String,
        expected: &'static str,
        found: &'static str,
    },
    MalformedUser {
        index: usize,
        message: String,
    },
    UserMissingName {
        index: usize,
    },
    InvalidUserName {
        index: usize,
        name: String,
    },
    MalformedFile {
        index: usize,
        message: String,
    },
    MissingContent(String),
    InvalidPermissions {
        path: String,
        permissions: String,
    },
    UnknownEncoding {
        path: String,
        encoding: String,
    },
    MalformedCommand {
        section: &'static str,
        index: usize,
        message: String,
    },
    UnknownTimezone(String),
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongType {
                section,
                expected,
                found,
            } => write!(f, "section '{section}' should be a {expected}, found {found}"),
            Self::MalformedUser { index, message } => {
                write!(f, "users[{index}] is malformed: {message}")
            }
            Self::UserMissingName { index } => write!(f, "users[{index}] has no name"),
            Self::InvalidUserName { index, name } => {
                write!(f, "users[{index}] has invalid name '{name}'")
            }
            Self::MalformedFile { index, message } => {
                write!(f, "write_files[{index}] is malformed: {message}")
            }
            Self::MissingContent(path) => {
                write!(f, "{path}: no content given; an empty file will be written")
            }
            Self::InvalidPermissions { path, permissions } => {
                write!(f, "{path}: permissions '{permissions}' are not octal")
            }
            Self::UnknownEncoding { path, encoding } => {
                write!(f, "{path}: unknown encoding '{encoding}'")
            }
            Self::MalformedCommand {
                section,
                index,
                message,
            } => write!(f, "{section}[{index}] is malformed: {message}"),
            Self::UnknownTimezone(tz) => {
                write!(f, "timezone '{tz}' has no zoneinfo data; timezone will not be set")
            }
        }
    }
}

/// Outcome of validating a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
    /// Set when the timezone phase must not run
    pub skip_timezone: bool,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, warning: ValidationWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Parse and validate block-form text; parse failure is the one hard error
pub fn validate_source(
    text: &str,
    config: &RunConfiguration,
) -> Result<(Document, ValidationReport), CloudApplyError> {
    let doc = Document::from_yaml(text).map_err(|e| CloudApplyError::Validation(e.to_string()))?;
    let report = validate(&doc, config);
    Ok((doc, report))
}

/// Check a parsed document
pub fn validate(doc: &Document, config: &RunConfiguration) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_types(doc, &mut report);
    check_users(doc, &mut report);
    check_files(doc, &mut report);
    check_commands("bootcmd", doc.bootcmd(), &mut report);
    check_commands("runcmd", doc.runcmd(), &mut report);

    if let Some(tz) = doc.timezone()
        && !timezone_available(&config.zoneinfo_dir, &tz)
    {
        report.warn(ValidationWarning::UnknownTimezone(tz));
        report.skip_timezone = true;
    }

    let unrecognized = doc.unrecognized_sections();
    if !unrecognized.is_empty() {
        debug!("Ignoring unrecognized sections: {:?}", unrecognized);
    }

    report
}

fn check_types(doc: &Document, report: &mut ValidationReport) {
    const SEQUENCES: &[&str] = &[
        "packages",
        "users",
        "ssh_authorized_keys",
        "write_files",
        "bootcmd",
        "runcmd",
    ];
    const SCALARS: &[&str] = &["hostname", "timezone", "locale", "final_message"];

    for &section in SEQUENCES {
        if let Some(value) = doc.get(section)
            && !matches!(value, Value::Sequence(_) | Value::Null)
        {
            report.warn(ValidationWarning::WrongType {
                section: section.to_string(),
                expected: "sequence",
                found: value_kind(value),
            });
        }
    }

    for &section in SCALARS {
        if let Some(value) = doc.get(section)
            && matches!(value, Value::Sequence(_) | Value::Mapping(_))
        {
            report.warn(ValidationWarning::WrongType {
                section: section.to_string(),
                expected: "string",
                found: value_kind(value),
            });
        }
    }
}

fn check_users(doc: &Document, report: &mut ValidationReport) {
    for (index, entry) in doc.users().into_iter().enumerate() {
        match entry {
            Err(message) => report.warn(ValidationWarning::MalformedUser { index, message }),
            Ok(user) => match user.name {
                None => report.warn(ValidationWarning::UserMissingName { index }),
                Some(name) if !is_valid_username(&name) => {
                    report.warn(ValidationWarning::InvalidUserName { index, name })
                }
                Some(_) => {}
            },
        }
    }
}

fn check_files(doc: &Document, report: &mut ValidationReport) {
    for (index, entry) in doc.write_files().into_iter().enumerate() {
        let file: FileRecord = match entry {
            Ok(file) => file,
            Err(message) => {
                report.warn(ValidationWarning::MalformedFile { index, message });
                continue;
            }
        };

        if file.content.is_none() {
            report.warn(ValidationWarning::MissingContent(file.path.clone()));
        }

        if !is_octal_mode(file.permissions()) {
            report.warn(ValidationWarning::InvalidPermissions {
                path: file.path.clone(),
                permissions: file.permissions().to_string(),
            });
        }

        if let Some(encoding) = &file.encoding
            && !crate::modules::write_files::is_known_encoding(encoding)
        {
            report.warn(ValidationWarning::UnknownEncoding {
                path: file.path.clone(),
                encoding: encoding.clone(),
            });
        }
    }
}

fn check_commands(
    section: &'static str,
    entries: Vec<Result<RunCmd, String>>,
    report: &mut ValidationReport,
) {
    for (index, entry) in entries.into_iter().enumerate() {
        if let Err(message) = entry {
            report.warn(ValidationWarning::MalformedCommand {
                section,
                index,
                message,
            });
        }
    }
}

/// `^[a-z_][a-z0-9_-]*$`
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_RE.is_match(name)
}

fn is_octal_mode(mode: &str) -> bool {
    !mode.is_empty() && mode.len() <= 5 && mode.chars().all(|c| ('0'..='7').contains(&c))
}

/// Zoneinfo data exists for `tz` (relative names only, no `..`)
pub fn timezone_available(zoneinfo_dir: &Path, tz: &str) -> bool {
    let rel = Path::new(tz);
    if tz.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return false;
    }
    zoneinfo_dir.join(rel).is_file()
}
