//! Cloud-config document model
//!
//! A document is an ordered mapping of section name to value. Recognized
//! sections are read through typed accessors; anything else is carried along
//! untouched so that merges and rewrites preserve it.

pub mod format;
pub mod loader;
pub mod merge;
pub mod validate;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

/// Header line that marks a cloud-config document
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

/// Top-level sections acted upon by the pipeline
pub const RECOGNIZED_SECTIONS: &[&str] = &[
    "bootcmd",
    "packages",
    "package_update",
    "package_upgrade",
    "users",
    "ssh_authorized_keys",
    "write_files",
    "hostname",
    "timezone",
    "locale",
    "runcmd",
    "final_message",
];

/// In-memory cloud-config document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    /// Wrap an already-parsed mapping
    pub fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Parse a block-form document
    ///
    /// The `#cloud-config` header is optional. An empty document is valid and
    /// has no sections; a document whose root is not a mapping is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let yaml = yaml
            .trim_start()
            .strip_prefix(CLOUD_CONFIG_HEADER)
            .unwrap_or(yaml);

        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Null => Ok(Self::default()),
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(<serde_yaml::Error as serde::de::Error>::custom(format!(
                "document root must be a mapping, found {}",
                value_kind(&other)
            ))),
        }
    }

    /// Serialize to canonical block form, header included
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let body = if self.root.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.root)?
        };
        Ok(format!("{CLOUD_CONFIG_HEADER}\n{body}"))
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn get(&self, section: &str) -> Option<&Value> {
        self.root.get(section)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Section names in document order
    pub fn sections(&self) -> Vec<String> {
        self.root
            .keys()
            .map(|k| scalar_to_string(k).unwrap_or_else(|| format!("{k:?}")))
            .collect()
    }

    /// Sections that are carried but never acted upon
    pub fn unrecognized_sections(&self) -> Vec<String> {
        self.sections()
            .into_iter()
            .filter(|s| !RECOGNIZED_SECTIONS.contains(&s.as_str()))
            .collect()
    }

    /// A scalar section rendered as a string (`hostname: 42` reads as "42")
    pub fn string(&self, section: &str) -> Option<String> {
        self.get(section).and_then(scalar_to_string)
    }

    /// A sequence-of-scalars section; non-scalar items are dropped
    pub fn string_list(&self, section: &str) -> Vec<String> {
        match self.get(section) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn flag(&self, section: &str) -> bool {
        matches!(self.get(section), Some(Value::Bool(true)))
    }

    pub fn hostname(&self) -> Option<String> {
        self.string("hostname")
    }

    pub fn timezone(&self) -> Option<String> {
        self.string("timezone")
    }

    pub fn locale(&self) -> Option<String> {
        self.string("locale")
    }

    pub fn final_message(&self) -> Option<String> {
        self.string("final_message")
    }

    pub fn packages(&self) -> Vec<String> {
        self.string_list("packages")
    }

    pub fn ssh_authorized_keys(&self) -> Vec<String> {
        self.string_list("ssh_authorized_keys")
    }

    /// User entries by position; malformed entries carry the parse message
    pub fn users(&self) -> Vec<Result<UserRecord, String>> {
        sequence_entries(self.get("users"), |value| {
            // Derived struct visitors also accept sequences by position
            if !matches!(value, Value::String(_) | Value::Mapping(_)) {
                return Err(format!("expected a name or a mapping, found {}", value_kind(value)));
            }
            match serde_yaml::from_value::<UserConfig>(value.clone()) {
                Ok(UserConfig::Name(name)) => Ok(UserRecord {
                    name: Some(name),
                    ..Default::default()
                }),
                Ok(UserConfig::Full(record)) => Ok(record),
                Err(e) => Err(e.to_string()),
            }
        })
    }

    /// File entries by position; malformed entries carry the parse message
    pub fn write_files(&self) -> Vec<Result<FileRecord, String>> {
        sequence_entries(self.get("write_files"), |value| {
            if !matches!(value, Value::Mapping(_)) {
                return Err(format!("expected a mapping, found {}", value_kind(value)));
            }
            serde_yaml::from_value::<FileRecord>(value.clone()).map_err(|e| e.to_string())
        })
    }

    pub fn bootcmd(&self) -> Vec<Result<RunCmd, String>> {
        self.commands("bootcmd")
    }

    pub fn runcmd(&self) -> Vec<Result<RunCmd, String>> {
        self.commands("runcmd")
    }

    fn commands(&self, section: &str) -> Vec<Result<RunCmd, String>> {
        sequence_entries(self.get(section), |value| {
            serde_yaml::from_value::<RunCmd>(value.clone()).map_err(|e| e.to_string())
        })
    }

    /// Name of the first named user, used as the default account
    pub fn default_user(&self) -> Option<String> {
        self.users()
            .into_iter()
            .filter_map(Result::ok)
            .find_map(|u| u.name)
    }
}

fn sequence_entries<T>(
    value: Option<&Value>,
    parse: impl Fn(&Value) -> Result<T, String>,
) -> Vec<Result<T, String>> {
    match value {
        Some(Value::Sequence(items)) => items.iter().map(parse).collect(),
        _ => Vec::new(),
    }
}

/// Render a YAML scalar as a string; mappings and sequences yield `None`
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

/// Human name for a YAML value kind
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// A user entry: bare name or full record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserConfig {
    Name(String),
    Full(UserRecord),
}

/// User record
///
/// Only `name` is consumed today; the remaining fields are accepted so
/// documents written for full cloud-init still parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub name: Option<String>,
    pub groups: Option<StringOrList>,
    pub shell: Option<String>,
    pub sudo: Option<StringOrList>,
}

/// A field that may be written as one string or a list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// File to write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    /// Required, though it may be empty; a missing key is written as empty
    pub content: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub permissions: Option<String>,
    pub owner: Option<String>,
    pub encoding: Option<String>,
    pub append: Option<bool>,
}

impl FileRecord {
    pub const DEFAULT_PERMISSIONS: &'static str = "0644";

    pub fn permissions(&self) -> &str {
        self.permissions
            .as_deref()
            .unwrap_or(Self::DEFAULT_PERMISSIONS)
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn is_append(&self) -> bool {
        self.append == Some(true)
    }
}

/// Accept `permissions: '0644'` as well as `permissions: 644`
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

/// Command as written in bootcmd/runcmd
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunCmd {
    Plain(CommandLine),
    Detailed {
        cmd: CommandLine,
        #[serde(default)]
        allow_failure: bool,
    },
}

/// Shell string or argv list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Args(Vec<String>),
}

impl RunCmd {
    /// Command string handed to the shell; `None` for an empty argv
    pub fn command_line(&self) -> Option<String> {
        let line = match self {
            RunCmd::Plain(line) | RunCmd::Detailed { cmd: line, .. } => line,
        };
        match line {
            CommandLine::Shell(s) if s.trim().is_empty() => None,
            CommandLine::Shell(s) => Some(s.clone()),
            CommandLine::Args(args) if args.is_empty() => None,
            CommandLine::Args(args) => Some(shell_words::join(args)),
        }
    }

    /// Commands are strict unless explicitly marked tolerant
    pub fn allow_failure(&self) -> bool {
        matches!(
            self,
            RunCmd::Detailed {
                allow_failure: true,
                ..
            }
        )
    }
}
