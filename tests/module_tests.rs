//! Tests for document parsing, normalization, merging and validation

use cloud_config_apply::RunConfiguration;
use cloud_config_apply::config::format::{is_flow_style, normalize, normalize_file};
use cloud_config_apply::config::merge::{merge_override, parse_override};
use cloud_config_apply::config::validate::{ValidationWarning, validate_source};
use cloud_config_apply::config::{Document, StringOrList};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn doc(yaml: &str) -> Document {
    Document::from_yaml(yaml).unwrap()
}

// ==================== Flow Detection Tests ====================

/// Single JSON object is flow-style
#[test]
fn test_json_object_detected() {
    assert!(is_flow_style(r#"{"hostname":"x"}"#));
    assert!(is_flow_style("  # leading comment\n{\"hostname\": \"x\"}\n\n"));
}

/// Ordinary block document is not flow-style
#[test]
fn test_block_document_not_detected() {
    assert!(!is_flow_style("hostname: x\npackages:\n  - vim\n"));
    assert!(!is_flow_style("#cloud-config\nhostname: x\n"));
}

/// Two literals, or a literal followed by more text, are not one flow document
#[test]
fn test_partial_literals_not_detected() {
    assert!(!is_flow_style("{a: 1} {b: 2}"));
    assert!(!is_flow_style("{a: 1}\nhostname: x"));
    assert!(!is_flow_style("{a: [1, 2}"));
    assert!(!is_flow_style(""));
}

/// Braces inside strings do not confuse detection
#[test]
fn test_quoted_braces() {
    assert!(is_flow_style(r#"{"final_message": "done }"}"#));
    assert!(is_flow_style(r#"{"runcmd": ["echo '{'"]}"#));
}

// ==================== Normalization Tests ====================

/// Normalized flow text reparses to the same document as the flow text itself
#[test]
fn test_round_trip() {
    let flow = r#"{"hostname": "srv1", "packages": ["curl", "git"], "users": [{"name": "deploy", "groups": ["wheel"]}], "package_update": true}"#;

    let block = normalize(flow, Path::new("user-data")).unwrap();
    assert!(block.starts_with("#cloud-config\n"));
    assert!(!is_flow_style(&block));
    assert_eq!(doc(&block), doc(flow));
}

/// YAML flow syntax (unquoted keys) normalizes as well
#[test]
fn test_yaml_flow_normalizes() {
    let block = normalize("{hostname: a, runcmd: [ls, pwd]}", Path::new("x")).unwrap();
    let parsed = doc(&block);
    assert_eq!(parsed.hostname(), Some("a".to_string()));
    assert_eq!(parsed.runcmd().len(), 2);
}

/// Block files are left byte-for-byte alone
#[test]
fn test_normalize_file_skips_block() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("user-data");
    fs::write(&path, "hostname: a # keep\n").unwrap();

    assert!(!normalize_file(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), "hostname: a # keep\n");
}

/// Flow files are rewritten in place
#[test]
fn test_normalize_file_rewrites_flow() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("user-data");
    fs::write(&path, r#"{"hostname": "a"}"#).unwrap();

    assert!(normalize_file(&path).unwrap());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "#cloud-config\nhostname: a\n"
    );
}

// ==================== Merge Tests ====================

/// Scalar override leaves other sections alone
#[test]
fn test_override_scalar_keeps_packages() {
    let base = doc("hostname: a\npackages: [vim]\n");
    let merged = merge_override(&base, &parse_override(r#"{"hostname": "b"}"#).unwrap());

    assert_eq!(merged.hostname(), Some("b".to_string()));
    assert_eq!(merged.packages(), vec!["vim"]);
}

/// Sequence override replaces rather than unions
#[test]
fn test_override_sequence_replaces() {
    let base = doc("hostname: a\npackages: [vim]\n");
    let merged = merge_override(
        &base,
        &parse_override(r#"{"packages": ["curl", "git"]}"#).unwrap(),
    );

    assert_eq!(merged.packages(), vec!["curl", "git"]);
    assert_eq!(merged.hostname(), Some("a".to_string()));
}

/// Nested mappings merge key by key
#[test]
fn test_override_nested_mapping() {
    let base = doc("extra:\n  a: 1\n  b: 2\n");
    let merged = merge_override(&base, &parse_override("{extra: {b: 3, c: 4}}").unwrap());
    let expected = doc("extra:\n  a: 1\n  b: 3\n  c: 4\n");

    assert_eq!(merged, expected);
}

/// Flat pairs are trimmed and malformed tokens dropped
#[test]
fn test_flat_override() {
    let overlay = parse_override(" hostname = prod , bogus, timezone=UTC,").unwrap();
    let merged = merge_override(&doc("hostname: dev\n"), &overlay);

    assert_eq!(merged, doc("hostname: prod\ntimezone: UTC\n"));
}

/// The base document is not modified by a merge
#[test]
fn test_merge_produces_new_document() {
    let base = doc("hostname: dev\n");
    let _ = merge_override(&base, &parse_override("hostname=prod").unwrap());
    assert_eq!(base.hostname(), Some("dev".to_string()));
}

// ==================== Document Tests ====================

/// Users may be bare names or records with string-or-list fields
#[test]
fn test_user_forms() {
    let parsed = doc(
        r#"
users:
  - alice
  - name: bob
    groups: [wheel, docker]
    sudo: "ALL=(ALL) NOPASSWD:ALL"
    shell: /bin/bash
"#,
    );
    let users: Vec<_> = parsed.users().into_iter().map(Result::unwrap).collect();

    assert_eq!(users[0].name.as_deref(), Some("alice"));
    assert_eq!(users[1].name.as_deref(), Some("bob"));
    assert_eq!(
        users[1].groups,
        Some(StringOrList::Many(vec!["wheel".into(), "docker".into()]))
    );
    assert_eq!(
        users[1].sudo,
        Some(StringOrList::One("ALL=(ALL) NOPASSWD:ALL".into()))
    );
    assert_eq!(parsed.default_user(), Some("alice".to_string()));
}

/// Numeric permissions are read as strings and default to 0644
#[test]
fn test_file_permissions() {
    let parsed = doc(
        r#"
write_files:
  - path: /etc/a
    permissions: 600
  - path: /etc/b
    content: ""
"#,
    );
    let files: Vec<_> = parsed.write_files().into_iter().map(Result::unwrap).collect();

    assert_eq!(files[0].permissions(), "600");
    assert_eq!(files[1].permissions(), "0644");
    assert_eq!(files[1].content.as_deref(), Some(""));
}

/// Command entries: shell string, argv list, or tolerant record
#[test]
fn test_command_forms() {
    let parsed = doc(
        r#"
runcmd:
  - systemctl restart nginx
  - [sh, -c, "echo hi > /tmp/x"]
  - cmd: might-fail
    allow_failure: true
"#,
    );
    let cmds: Vec<_> = parsed.runcmd().into_iter().map(Result::unwrap).collect();

    assert_eq!(
        cmds[0].command_line(),
        Some("systemctl restart nginx".to_string())
    );
    assert!(!cmds[0].allow_failure());
    assert_eq!(
        cmds[1].command_line(),
        Some("sh -c 'echo hi > /tmp/x'".to_string())
    );
    assert!(cmds[2].allow_failure());
}

/// Unknown sections survive parsing and re-serialization
#[test]
fn test_unrecognized_sections_preserved() {
    let parsed = doc("hostname: a\nmounts: [[sdb, /data]]\n");
    assert_eq!(parsed.unrecognized_sections(), vec!["mounts"]);

    let reparsed = doc(&parsed.to_yaml().unwrap());
    assert_eq!(reparsed, parsed);
}

// ==================== Validation Tests ====================

/// Users are checked in order; missing names and bad names only warn
#[test]
fn test_user_validation_warnings() {
    let (_, report) = validate_source(
        "users:\n  - name: ok\n  - groups: wheel\n  - name: Root\n",
        &RunConfiguration::default(),
    )
    .unwrap();

    assert_eq!(
        report.warnings,
        vec![
            ValidationWarning::UserMissingName { index: 1 },
            ValidationWarning::InvalidUserName {
                index: 2,
                name: "Root".into()
            },
        ]
    );
    assert!(!report.skip_timezone);
}

/// Missing zoneinfo marks only the timezone phase for skipping
#[test]
fn test_missing_zoneinfo() {
    let temp = TempDir::new().unwrap();
    let config = RunConfiguration::default().with_zoneinfo_dir(temp.path());

    let (_, report) = validate_source("timezone: Europe/Paris\n", &config).unwrap();
    assert!(report.skip_timezone);
    assert_eq!(report.warnings.len(), 1);
}
