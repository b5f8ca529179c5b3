//! Runtime override merging
//!
//! An override arrives as either a flat `key=value,key=value` list or a
//! brace-delimited structured literal (JSON or YAML flow). It is merged over
//! the document with these rules:
//! - mapping over mapping merges recursively
//! - anything else replaces the base value outright (sequences included)
//! - keys missing from the override are left alone

use super::{Document, value_kind};
use crate::CloudApplyError;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// Parse an override specification into a mapping
pub fn parse_override(spec: &str) -> Result<Mapping, CloudApplyError> {
    let trimmed = spec.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        parse_structured(trimmed)
    } else {
        Ok(parse_pairs(trimmed))
    }
}

fn parse_structured(spec: &str) -> Result<Mapping, CloudApplyError> {
    let value = match serde_json::from_str::<serde_json::Value>(spec) {
        Ok(json) => serde_yaml::to_value(json)?,
        Err(json_err) => {
            debug!("Override is not strict JSON ({}), trying flow syntax", json_err);
            serde_yaml::from_str::<Value>(spec).map_err(|yaml_err| {
                CloudApplyError::OverrideSyntax(format!(
                    "neither JSON ({json_err}) nor flow syntax ({yaml_err})"
                ))
            })?
        }
    };

    match value {
        Value::Mapping(map) => Ok(map),
        other => Err(CloudApplyError::OverrideSyntax(format!(
            "expected a mapping, found {}",
            value_kind(&other)
        ))),
    }
}

/// Split `a=1, b = two` into string entries; tokens without `=` are skipped
fn parse_pairs(spec: &str) -> Mapping {
    let mut map = Mapping::new();

    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once('=') else {
            warn!("Ignoring override token without '=': {}", token);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!("Ignoring override token with empty key: {}", token);
            continue;
        }
        map.insert(
            Value::String(key.to_string()),
            Value::String(value.trim().to_string()),
        );
    }

    map
}

/// Merge an override into a document, producing a new document
pub fn merge_override(base: &Document, overlay: &Mapping) -> Document {
    let merged = merge_values(
        &Value::Mapping(base.as_mapping().clone()),
        &Value::Mapping(overlay.clone()),
    );
    match merged {
        Value::Mapping(root) => Document::from_mapping(root),
        // Mapping over mapping always yields a mapping
        _ => base.clone(),
    }
}

/// Merge two YAML values recursively
pub fn merge_values(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                let merged = match result.get(key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                result.insert(key.clone(), merged);
            }

            Value::Mapping(result)
        }

        (_, overlay_value) => overlay_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_scalar_override_keeps_other_sections() {
        let base = doc("hostname: a\npackages: [vim]\n");
        let overlay = parse_override(r#"{"hostname": "b"}"#).unwrap();

        let merged = merge_override(&base, &overlay);
        assert_eq!(merged.hostname(), Some("b".to_string()));
        assert_eq!(merged.packages(), vec!["vim"]);
    }

    #[test]
    fn test_sequences_are_replaced() {
        let base = doc("hostname: a\npackages: [vim]\n");
        let overlay = parse_override(r#"{"packages": ["curl", "git"]}"#).unwrap();

        let merged = merge_override(&base, &overlay);
        assert_eq!(merged.packages(), vec!["curl", "git"]);
    }

    #[test]
    fn test_key_value_pairs() {
        let base = doc("hostname: dev\n");
        let overlay = parse_override("hostname=prod,timezone=UTC").unwrap();

        let merged = merge_override(&base, &overlay);
        assert_eq!(merged.hostname(), Some("prod".to_string()));
        assert_eq!(merged.timezone(), Some("UTC".to_string()));
        assert_eq!(merged.sections(), vec!["hostname", "timezone"]);
    }

    #[test]
    fn test_pairs_are_trimmed_and_malformed_dropped() {
        let map = parse_override(" hostname = prod , bogus ,, =x, locale=en_US.UTF-8").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("hostname"), Some(&Value::String("prod".into())));
        assert_eq!(
            map.get("locale"),
            Some(&Value::String("en_US.UTF-8".into()))
        );
    }

    #[test]
    fn test_pair_values_stay_strings() {
        let map = parse_override("package_update=true,port=22").unwrap();
        assert_eq!(map.get("package_update"), Some(&Value::String("true".into())));
        assert_eq!(map.get("port"), Some(&Value::String("22".into())));
    }

    #[test]
    fn test_special_characters_survive_round_trip() {
        let base = doc("hostname: a\n");
        let overlay = parse_override("final_message=done: \"ok\" # really").unwrap();
        let merged = merge_override(&base, &overlay);

        let reparsed = Document::from_yaml(&merged.to_yaml().unwrap()).unwrap();
        assert_eq!(
            reparsed.final_message(),
            Some("done: \"ok\" # really".to_string())
        );
    }

    #[test]
    fn test_flow_override_keeps_native_types() {
        let map = parse_override("{package_update: true, packages: [curl]}").unwrap();
        assert_eq!(map.get("package_update"), Some(&Value::Bool(true)));
        assert!(map.get("packages").unwrap().is_sequence());
    }

    #[test]
    fn test_nested_mappings_merge() {
        let base = doc("ntp:\n  enabled: true\n  servers: [a]\n");
        let overlay = parse_override(r#"{"ntp": {"servers": ["b"]}}"#).unwrap();

        let merged = merge_override(&base, &overlay);
        let ntp = merged.get("ntp").unwrap().as_mapping().unwrap();
        assert_eq!(ntp.get("enabled"), Some(&Value::Bool(true)));
        assert_eq!(
            ntp.get("servers"),
            Some(&Value::Sequence(vec![Value::String("b".into())]))
        );
    }

    #[test]
    fn test_invalid_structured_override() {
        let err = parse_override("{hostname: [}").unwrap_err();
        assert!(matches!(err, CloudApplyError::OverrideSyntax(_)));
    }

    #[test]
    fn test_base_is_untouched() {
        let base = doc("hostname: a\n");
        let overlay = parse_override("hostname=b").unwrap();
        let _ = merge_override(&base, &overlay);
        assert_eq!(base.hostname(), Some("a".to_string()));
    }
}
